//! Error types for shared operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}
