//! Feature modules implementing the Stockroom API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes:
//! - `commands/` - Write operations (upload, cancel, delete)
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions and error mapping
//! - `types.rs` - Response shapes
//!
//! # Features
//!
//! - **imports**: bulk CSV import upload, progress polling and management

pub mod imports;
pub mod shared;

use axum::Router;
use std::sync::Arc;

use crate::imports::{ImportJobRepository, JobQueue};
use crate::storage::UploadStorage;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Job and row-error persistence
    pub repository: Arc<dyn ImportJobRepository>,
    /// Producer side of the processing queue
    pub queue: Arc<dyn JobQueue>,
    /// Upload directory for accepted files
    pub storage: UploadStorage,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

/// Creates the API router with all feature routes mounted
///
/// - `/imports` - Bulk import jobs
pub fn router(state: FeatureState) -> Router<()> {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new().nest("/imports", imports::imports_routes(max_upload_bytes).with_state(state))
}
