//! Cancel command
//!
//! Cancellation only marks the job; a worker already processing it notices
//! at its next progress checkpoint and stops. The write touches status and
//! timestamps only, so counters the worker reported meanwhile are kept.

use mediator::Request;
use tracing::info;
use uuid::Uuid;

use crate::db::DbError;
use crate::features::FeatureState;
use crate::imports::{DomainError, ImportJob};

#[derive(Debug, Clone, Copy)]
pub struct CancelImportCommand {
    pub id: Uuid,
    pub workspace_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum CancelImportError {
    #[error("import job not found")]
    NotFound,
    #[error(transparent)]
    InvalidTransition(#[from] DomainError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ImportJob, CancelImportError>> for CancelImportCommand {}

impl crate::cqrs::middleware::Command for CancelImportCommand {}

fn not_found_or_database(e: DbError) -> CancelImportError {
    if e.is_not_found() {
        CancelImportError::NotFound
    } else {
        CancelImportError::Database(e)
    }
}

#[tracing::instrument(skip(state), fields(job_id = %command.id, workspace_id = %command.workspace_id))]
pub async fn handle(
    state: &FeatureState,
    command: CancelImportCommand,
) -> Result<ImportJob, CancelImportError> {
    let mut job = state
        .repository
        .find_job_by_id(command.id, command.workspace_id)
        .await
        .map_err(not_found_or_database)?;

    // Rejects terminal jobs up front; the guarded write settles races.
    job.cancel()?;

    match state
        .repository
        .cancel_job(command.id, command.workspace_id)
        .await?
    {
        Some(cancelled) => {
            info!(processed_rows = cancelled.processed_rows(), "Import job cancelled");
            Ok(cancelled)
        },
        None => {
            let current = state
                .repository
                .find_job_by_id(command.id, command.workspace_id)
                .await
                .map_err(not_found_or_database)?;

            Err(DomainError::InvalidTransition {
                from: current.status(),
                action: "cancel",
            }
            .into())
        },
    }
}
