//! Reconciliation of sheet records with a new batch.
//!
//! - [`uniqueness`] - dedup keys and first/last-wins dedup
//! - [`engine`] - append, replace and custom transform strategies

pub mod engine;
pub mod uniqueness;

pub use engine::{merge, MergeConfig, MergeReport, Merged, Strategy};
pub use uniqueness::{content_hash, dedup_keep_first, dedup_keep_last, key_of, UniqueBy};
