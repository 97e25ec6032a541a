/// Core Module for dbshell
///
/// Shared infrastructure: the error type and the database layer the shells
/// are built on.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbShellError, Result};
