//! Get job query

use mediator::Request;
use uuid::Uuid;

use crate::db::DbError;
use crate::features::FeatureState;
use crate::imports::ImportJob;

#[derive(Debug, Clone, Copy)]
pub struct GetJobQuery {
    pub id: Uuid,
    pub workspace_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error("import job not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for GetJobError {
    fn from(e: DbError) -> Self {
        if e.is_not_found() {
            GetJobError::NotFound
        } else {
            GetJobError::Database(e)
        }
    }
}

impl Request<Result<ImportJob, GetJobError>> for GetJobQuery {}

impl crate::cqrs::middleware::Query for GetJobQuery {}

#[tracing::instrument(skip(state), fields(job_id = %query.id, workspace_id = %query.workspace_id))]
pub async fn handle(state: &FeatureState, query: GetJobQuery) -> Result<ImportJob, GetJobError> {
    Ok(state
        .repository
        .find_job_by_id(query.id, query.workspace_id)
        .await?)
}
