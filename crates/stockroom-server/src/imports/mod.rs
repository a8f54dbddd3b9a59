//! Bulk import pipeline
//!
//! - **models**: `ImportJob` / `ImportError` entities and their state machine
//! - **repository**: persistence contract and its PostgreSQL implementation
//! - **queue**: producer/consumer contract and the table-backed queue
//! - **importer**: the per-row import seam
//! - **worker**: background consumer that processes uploaded files
//! - **recovery**: sweep that fails jobs abandoned mid-run
//!
//! HTTP handlers live in `features::imports`.

pub mod importer;
pub mod models;
pub mod queue;
pub mod recovery;
pub mod repository;
pub mod worker;

#[cfg(test)]
pub mod testing;

pub use importer::{CsvRow, RequiredColumnsImporter, RowContext, RowFailure, RowImporter};
pub use models::{DomainError, ImportError, ImportJob, RowData};
pub use queue::{JobQueue, PgJobQueue, QueueConsumer, QueueError};
pub use recovery::StaleJobSweeper;
pub use repository::{ImportJobRepository, PgImportJobRepository};
pub use worker::{ImportWorker, ProcessOutcome, WorkerSettings};
