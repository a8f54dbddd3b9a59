//! Delete command
//!
//! Removes a job together with its row errors, then best-effort deletes the
//! stored upload. Errors go first so no error row outlives its job.

use mediator::Request;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbError;
use crate::features::FeatureState;

#[derive(Debug, Clone, Copy)]
pub struct DeleteImportCommand {
    pub id: Uuid,
    pub workspace_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteImportError {
    #[error("import job not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<(), DeleteImportError>> for DeleteImportCommand {}

impl crate::cqrs::middleware::Command for DeleteImportCommand {}

#[tracing::instrument(skip(state), fields(job_id = %command.id, workspace_id = %command.workspace_id))]
pub async fn handle(state: &FeatureState, command: DeleteImportCommand) -> Result<(), DeleteImportError> {
    let job = state
        .repository
        .find_job_by_id(command.id, command.workspace_id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                DeleteImportError::NotFound
            } else {
                DeleteImportError::Database(e)
            }
        })?;

    state.repository.delete_errors_by_job_id(job.id()).await?;
    state.repository.delete_job(job.id()).await.map_err(|e| {
        if e.is_not_found() {
            DeleteImportError::NotFound
        } else {
            DeleteImportError::Database(e)
        }
    })?;

    if let Err(e) = state.storage.remove(job.file_path()).await {
        warn!(path = %job.file_path(), error = %e, "Failed to remove import file");
    }

    info!("Import job deleted");
    Ok(())
}
