//! DSL (Domain Specific Language) for user transforms
//!
//! This module provides:
//! - `program`: Transform program definition (what the user writes)
//! - `operations`: Cell-level operations usable in `map` steps
//! - `executor`: Run a program over the new and old record sets
//!
//! ## Usage Flow
//!
//! ```text
//! transformFunction text → sandbox::compile → TransformProgram → executor::execute → RecordSet
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sheetsync::transform::dsl::{execute, TransformProgram};
//!
//! let program = TransformProgram::from_json(r#"{"input": "old_then_new", "steps": [
//!     {"type": "dedup", "fields": ["url"], "keep": "last"}
//! ]}"#).unwrap();
//!
//! let result = execute(&program, &new_records, &old_records);
//! println!("{}", result.summary());
//! ```

pub mod executor;
pub mod operations;
pub mod program;

// Re-exports for convenience
pub use executor::{execute, ExecutionResult};
pub use operations::{operations_description, Operation};
pub use program::{example_program, Condition, InputSelection, KeepPolicy, Step, TransformProgram};
