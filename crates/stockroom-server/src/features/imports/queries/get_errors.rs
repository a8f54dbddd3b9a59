//! Get job errors query
//!
//! Ownership is checked before any error row is read.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::get_job::{self, GetJobError, GetJobQuery};
use crate::db::DbError;
use crate::features::imports::types::ImportErrorResponse;
use crate::features::FeatureState;

#[derive(Debug, Clone, Copy)]
pub struct GetErrorsQuery {
    pub job_id: Uuid,
    pub workspace_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetErrorsResponse {
    pub errors: Vec<ImportErrorResponse>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GetErrorsError {
    #[error("import job not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<GetJobError> for GetErrorsError {
    fn from(e: GetJobError) -> Self {
        match e {
            GetJobError::NotFound => GetErrorsError::NotFound,
            GetJobError::Database(e) => GetErrorsError::Database(e),
        }
    }
}

impl Request<Result<GetErrorsResponse, GetErrorsError>> for GetErrorsQuery {}

impl crate::cqrs::middleware::Query for GetErrorsQuery {}

#[tracing::instrument(skip(state), fields(job_id = %query.job_id, workspace_id = %query.workspace_id))]
pub async fn handle(state: &FeatureState, query: GetErrorsQuery) -> Result<GetErrorsResponse, GetErrorsError> {
    let job = get_job::handle(
        state,
        GetJobQuery {
            id: query.job_id,
            workspace_id: query.workspace_id,
        },
    )
    .await?;

    let errors: Vec<ImportErrorResponse> = state
        .repository
        .find_errors_by_job_id(job.id())
        .await?
        .iter()
        .map(ImportErrorResponse::from)
        .collect();

    Ok(GetErrorsResponse {
        total: errors.len(),
        errors,
    })
}
