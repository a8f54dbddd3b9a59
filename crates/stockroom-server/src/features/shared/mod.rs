//! Shared utilities for feature modules
//!
//! - **pagination**: page/limit request parameters and response metadata

pub mod pagination;

pub use pagination::{PaginationMetadata, PaginationParams};
