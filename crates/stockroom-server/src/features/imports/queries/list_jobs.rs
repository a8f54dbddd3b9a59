//! List jobs query
//!
//! Newest-first page of the caller's import jobs.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DbError;
use crate::features::imports::types::ImportJobResponse;
use crate::features::shared::{PaginationMetadata, PaginationParams};
use crate::features::FeatureState;

#[derive(Debug, Clone, Copy)]
pub struct ListJobsQuery {
    pub workspace_id: Uuid,
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<ImportJobResponse>,
    #[serde(flatten)]
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListJobsError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ListJobsResponse, ListJobsError>> for ListJobsQuery {}

impl crate::cqrs::middleware::Query for ListJobsQuery {}

#[tracing::instrument(skip(state), fields(workspace_id = %query.workspace_id))]
pub async fn handle(state: &FeatureState, query: ListJobsQuery) -> Result<ListJobsResponse, ListJobsError> {
    let params = query.pagination;
    let (jobs, total) = state
        .repository
        .find_jobs_by_workspace(query.workspace_id, params.limit(), params.offset())
        .await?;

    Ok(ListJobsResponse {
        jobs: jobs.iter().map(ImportJobResponse::from).collect(),
        pagination: PaginationMetadata::from_params(&params, total),
    })
}
