//! Imports feature module
//!
//! HTTP surface of the bulk import pipeline: upload acceptance plus the
//! query and management operations clients use to poll progress.

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;


pub use routes::imports_routes;
pub use types::{ImportErrorResponse, ImportJobResponse};
