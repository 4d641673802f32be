//! HTTP API and run logs.
//!
//! [`logs`] is used by every layer of the crate, the server and its types
//! only by the `serve` command.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
