//! Transformation module.
//!
//! User supplied transforms replace the built-in merge strategies:
//! - DSL: transform programs, cell operations and their executor
//! - Sandbox: compiling program text into a callable [`TransformFn`]

pub mod dsl;
pub mod sandbox;

pub use dsl::*;
pub use sandbox::{compile, TransformFn, TransformInput};
