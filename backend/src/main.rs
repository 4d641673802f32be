//! Sheetsync CLI - reconcile record batches into spreadsheet ranges
//!
//! # Main Commands
//!
//! ```bash
//! sheetsync sync run.json                 # Full run against Google Sheets
//! sheetsync sync run.json --store s.json  # Same, against a local JSON grid
//! sheetsync serve                         # Start HTTP server (port 3000)
//! sheetsync backup list                   # Manage pre-write backups
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! sheetsync reconcile --new items.json --old rows.json   # Offline merge
//! sheetsync check-transform program.json                 # Compile a transform
//! sheetsync operations                                   # Show DSL operations
//! sheetsync example-transform                            # Show example program
//! ```

use clap::{Parser, Subcommand};
use sheetsync::{
    compile, example_program, operations_description, reconcile, restore, run, BackupSink,
    DatasetSource, DirectoryBackup, FileSource, JsonFileStore, MergeOptions, PipelineInput, Row,
    RowShape, RunConfig, RunOptions, SheetsClient, TabularStore, DEFAULT_MAX_CELLS,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the Sheets OAuth access token
const ACCESS_TOKEN_VAR: &str = "SHEETSYNC_ACCESS_TOKEN";
/// Optional Sheets endpoint override
const SHEETS_URL_VAR: &str = "SHEETSYNC_SHEETS_URL";

#[derive(Parser)]
#[command(name = "sheetsync")]
#[command(about = "Merge record batches into spreadsheet ranges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full run: load dataset, read sheet, merge, back up, write, trim
    Sync {
        /// Run configuration (JSON)
        config: PathBuf,

        /// Use a local JSON grid file instead of Google Sheets
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Reconcile and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge a dataset into rows offline and print the resulting grid
    Reconcile {
        /// New records (JSON array or CSV)
        #[arg(short, long)]
        new: PathBuf,

        /// Current rows as a JSON array of arrays, header first
        #[arg(long)]
        old: Option<PathBuf>,

        /// append or replace
        #[arg(short, long, default_value = "append")]
        mode: String,

        /// Deduplicate on this field
        #[arg(long)]
        dedup_field: Option<String>,

        /// Deduplicate on full record equality
        #[arg(long)]
        dedup_equality: bool,

        /// Transform program file
        #[arg(short, long)]
        transform: Option<PathBuf>,

        /// Columns to put first, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_MAX_CELLS)]
        max_cells: usize,

        /// Drop cells beyond the header instead of failing
        #[arg(long)]
        truncate_rows: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a transform program and report what it does
    CheckTransform {
        /// Transform program file
        file: PathBuf,
    },

    /// Show available transform DSL operations
    Operations,

    /// Show an example transform program
    ExampleTransform,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage backups taken before overwriting a sheet
    Backup {
        /// Backup directory
        #[arg(short, long, global = true)]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// List stored backups, newest first
    List,

    /// Print the rows of a backup
    Show {
        /// Backup ID
        id: String,
    },

    /// Write a backup back to the range of a run configuration
    Restore {
        /// Backup ID, or "latest" for the newest backup of the range
        id: String,

        /// Run configuration naming the target range
        config: PathBuf,

        /// Use a local JSON grid file instead of Google Sheets
        #[arg(short, long)]
        store: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync {
            config,
            store,
            dry_run,
        } => cmd_sync(&config, store.as_deref(), dry_run).await,

        Commands::Reconcile {
            new,
            old,
            mode,
            dedup_field,
            dedup_equality,
            transform,
            columns,
            max_cells,
            truncate_rows,
            output,
        } => {
            let merge = MergeOptions {
                mode,
                deduplicate_by_field: dedup_field,
                deduplicate_by_equality: dedup_equality,
                transform_function: None,
                columns_order: columns,
            };
            let row_shape = if truncate_rows { RowShape::Truncate } else { RowShape::Strict };
            cmd_reconcile(
                &new,
                old.as_deref(),
                merge,
                transform.as_deref(),
                max_cells,
                row_shape,
                output.as_deref(),
            )
        }

        Commands::CheckTransform { file } => cmd_check_transform(&file),

        Commands::Operations => {
            println!("{}", operations_description());
            Ok(())
        }

        Commands::ExampleTransform => cmd_example_transform(),

        Commands::Serve { port } => sheetsync::server::start_server(port).await,

        Commands::Backup { dir, action } => cmd_backup(dir, action).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Local JSON grid when `--store` is given, Google Sheets otherwise
fn open_store(store: Option<&Path>) -> Result<Box<dyn TabularStore>, Box<dyn std::error::Error>> {
    if let Some(path) = store {
        return Ok(Box::new(JsonFileStore::new(path)));
    }

    let token = std::env::var(ACCESS_TOKEN_VAR)
        .map_err(|_| format!("{} is not set (or pass --store for a local grid)", ACCESS_TOKEN_VAR))?;
    let mut client = SheetsClient::new(token);
    if let Ok(url) = std::env::var(SHEETS_URL_VAR) {
        client = client.with_base_url(&url);
    }
    Ok(Box::new(client))
}

fn backup_dir(config: &RunConfig) -> DirectoryBackup {
    config
        .backup_dir
        .as_deref()
        .map(DirectoryBackup::with_dir)
        .unwrap_or_default()
}

fn run_options(config: &RunConfig, dry_run: bool) -> Result<RunOptions, Box<dyn std::error::Error>> {
    let merge_config = config.validate()?;
    Ok(RunOptions::new(config.range_spec(), merge_config)
        .with_sheet_id(config.sheet_id)
        .with_max_cells(config.max_cells)
        .with_row_shape(config.row_shape)
        .with_backup(config.create_backup)
        .with_dry_run(dry_run))
}

async fn cmd_sync(
    config_path: &Path,
    store: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Run configuration: {}", config_path.display());

    // Every check that needs no I/O happens before the first remote call
    let config = RunConfig::from_file(config_path)?;
    let options = run_options(&config, dry_run)?;
    let source = config.dataset_source()?;
    let store = open_store(store)?;
    let backups = backup_dir(&config);
    let sink: Option<&dyn BackupSink> = config.create_backup.then_some(&backups as &dyn BackupSink);

    let summary = run(&options, source.as_ref(), store.as_ref(), sink).await?;

    eprintln!("\n📊 Summary");
    eprintln!("   Mode:        {:?}", summary.stats.merge.strategy);
    eprintln!("   Old records: {}", summary.stats.merge.old_records);
    eprintln!("   New records: {}", summary.stats.merge.new_records);
    eprintln!("   Result:      {} records", summary.stats.merge.result_records);
    eprintln!("   Duplicates:  {}", summary.stats.merge.duplicates_dropped);
    eprintln!("   Written:     {} rows", summary.rows_written);
    if let Some(ref id) = summary.backup_id {
        eprintln!("   Backup:      {}", id);
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_reconcile(
    new: &Path,
    old: Option<&Path>,
    mut merge: MergeOptions,
    transform: Option<&Path>,
    max_cells: usize,
    row_shape: RowShape,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = transform {
        merge.transform_function = Some(fs::read_to_string(path)?);
    }
    let merge_config = merge.to_merge_config()?;

    let new_records = FileSource::new(new).load_records()?;
    let old_rows: Option<Vec<Row>> = match old {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };
    eprintln!(
        "🔀 Merging {} new records into {} rows",
        new_records.len(),
        old_rows.as_ref().map_or(0, Vec::len)
    );

    let input = PipelineInput::new(new_records, old_rows, merge_config)
        .with_max_cells(max_cells)
        .with_row_shape(row_shape);
    let result = reconcile(&input)?;

    eprintln!(
        "   {} rows, {} cells, {} duplicates dropped",
        result.stats.rows, result.stats.cells, result.stats.merge.duplicates_dropped
    );
    if let Some(rows) = result.trim.target_row_count {
        eprintln!("   Trim rows to {}", rows);
    }
    if let Some(columns) = result.trim.target_column_count {
        eprintln!("   Trim columns to {}", columns);
    }

    let json = serde_json::to_string_pretty(&result.rows_to_write)?;
    write_output(&json, output)
}

fn cmd_check_transform(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(file)?;
    match compile(Some(source.as_str()))? {
        None => eprintln!("ℹ️  Transform is empty, the mode setting applies"),
        Some(transform) => {
            eprintln!("✅ Transform compiled");
            if let Some(program) = transform.program() {
                if !program.description.is_empty() {
                    eprintln!("   {}", program.description);
                }
                eprintln!("   Input: {:?}", program.input);
                for (name, count) in program.step_summary() {
                    eprintln!("   {} x {}", count, name);
                }
            }
        }
    }
    Ok(())
}

fn cmd_example_transform() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_program().to_json()?);
    Ok(())
}

async fn cmd_backup(dir: Option<PathBuf>, action: BackupAction) -> Result<(), Box<dyn std::error::Error>> {
    let backups = dir.map(DirectoryBackup::with_dir).unwrap_or_default();

    match action {
        BackupAction::List => {
            let stored = backups.list()?;
            if stored.is_empty() {
                eprintln!("📋 No backups in {}", backups.dir().display());
                return Ok(());
            }
            eprintln!("📋 Stored backups ({}):\n", stored.len());
            for b in stored {
                println!("  💾 {} ({})", b.id, b.key);
                println!("     Created: {}", b.created_at);
                println!("     Rows: {}", b.row_count);
                println!();
            }
        }

        BackupAction::Show { id } => {
            let backup = backups.get(&id)?;
            println!("{}", serde_json::to_string_pretty(&backup.rows)?);
        }

        BackupAction::Restore {
            id,
            config,
            store,
            dry_run,
        } => {
            let config = RunConfig::from_file(&config)?;
            let backup = if id == "latest" {
                backups.latest(&config.backup_key())?
            } else {
                backups.get(&id)?
            };
            eprintln!("♻️  Restoring {} ({} rows) to {}", backup.id, backup.row_count, config.range);

            let options = run_options(&config, dry_run)?;
            let store = open_store(store.as_deref())?;
            let trim = restore(&options, &backup, store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&trim)?);
        }
    }

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
