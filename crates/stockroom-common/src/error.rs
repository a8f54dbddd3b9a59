//! Error types shared across Stockroom crates

use thiserror::Error;

/// Result type alias for shared Stockroom operations
pub type Result<T> = std::result::Result<T, StockroomError>;

/// Errors raised by the shared types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockroomError {
    #[error("invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("invalid import status: {0}")]
    InvalidImportStatus(String),
}
