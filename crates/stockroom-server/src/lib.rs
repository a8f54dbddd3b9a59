//! Stockroom Server Library
//!
//! HTTP server and background worker for the inventory bulk import pipeline.
//!
//! # Overview
//!
//! A client uploads a CSV file; the server validates it, stores it, records a
//! pending import job and queues it. A background worker claims the job,
//! imports the file row by row and reports live progress. Clients poll the
//! job and its row-level errors until it reaches a terminal state.
//!
//! - **API Endpoints**: upload, list, get, errors, cancel and delete under
//!   `/api/v1/imports`
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Queue**: table-backed job queue with leased delivery
//! - **Storage Backend**: local upload directory
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS, request logging, and workspace context
//!
//! # Architecture
//!
//! Feature slices separate commands (upload, cancel, delete) from queries
//! (list, get, errors). The import pipeline itself lives in [`imports`]:
//! entities, the repository and queue contracts, the worker and the stale
//! job sweeper.
//!
//! # Example
//!
//! ```no_run
//! use stockroom_server::{config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&db::DbConfig::from(&config.database)).await?;
//!     db::health_check(&pool).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod imports;
pub mod middleware;
pub mod storage;

// Re-export commonly used types
pub use error::AppError;
