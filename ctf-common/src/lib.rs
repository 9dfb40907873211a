//! Shared plumbing for the render and gateway services
//!
//! Both services log through `tracing`, keep their exercise records in
//! append-only text files, and create their working directories on a
//! best-effort basis at startup. Those pieces live here.

pub mod error;
pub mod journal;
pub mod logging;

pub use error::CommonError;
pub use journal::{ensure_dirs, escape_newlines, truncate_chars, Journal};
pub use logging::{init_logging, LoggingConfig};

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;
