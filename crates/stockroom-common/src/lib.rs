//! Stockroom Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the Stockroom workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`StockroomError`] and its result alias
//! - **Types**: import entity types, job statuses and the queue message
//!   exchanged between the upload path and the import worker
//! - **Logging**: tracing subscriber setup driven by `LOG_*` variables
//!
//! # Example
//!
//! ```no_run
//! use stockroom_common::logging::{init_logging, LogConfig};
//! use stockroom_common::types::EntityType;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let entity: EntityType = "items".parse()?;
//!     tracing::info!(entity = %entity, "ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, StockroomError};
pub use types::{EntityType, ImportProcessMessage, ImportStatus, IMPORT_PROCESS_TOPIC};
