//! Upload command
//!
//! Accepts a CSV file for import: validates the request, stores the file,
//! records a pending job and queues it for the background worker.

use mediator::Request;
use std::path::Path;
use stockroom_common::{EntityType, ImportProcessMessage, IMPORT_PROCESS_TOPIC};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::DbError;
use crate::features::FeatureState;
use crate::imports::{DomainError, ImportJob, QueueError};
use crate::storage::{StoredFile, UploadStorage};

/// File part of an upload request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadImportCommand {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadImportError {
    #[error("file too large")]
    BodyTooLarge,
    #[error("invalid multipart body: {0}")]
    InvalidMultipart(String),
    #[error("entity_type is required")]
    EntityTypeRequired,
    #[error("invalid entity_type")]
    InvalidEntityType,
    #[error("file is required")]
    FileRequired,
    #[error("only CSV files are supported")]
    UnsupportedFileType,
    #[error("file size exceeds maximum allowed")]
    FileSizeExceeded,
    #[error("{0}")]
    InvalidJob(#[from] DomainError),
    #[error("Storage error: {0}")]
    Storage(anyhow::Error),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl UploadImportError {
    /// Client errors leave no job or file behind
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            UploadImportError::Storage(_)
                | UploadImportError::Database(_)
                | UploadImportError::Queue(_)
        )
    }
}

impl Request<Result<ImportJob, UploadImportError>> for UploadImportCommand {}

impl crate::cqrs::middleware::Command for UploadImportCommand {}

fn has_csv_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

impl UploadImportCommand {
    /// Check the request fields in order, returning the parsed entity type
    pub fn validate(&self, max_upload_bytes: usize) -> Result<EntityType, UploadImportError> {
        let entity_type = match self.entity_type.as_deref().map(str::trim) {
            None | Some("") => return Err(UploadImportError::EntityTypeRequired),
            Some(raw) => raw
                .parse::<EntityType>()
                .map_err(|_| UploadImportError::InvalidEntityType)?,
        };

        let file = self.file.as_ref().ok_or(UploadImportError::FileRequired)?;
        if !has_csv_extension(&file.file_name) {
            return Err(UploadImportError::UnsupportedFileType);
        }
        if file.content.len() > max_upload_bytes {
            return Err(UploadImportError::FileSizeExceeded);
        }

        Ok(entity_type)
    }
}

async fn discard(storage: &UploadStorage, stored: &StoredFile) {
    if let Err(e) = storage.remove(&stored.path).await {
        warn!(path = %stored.path.display(), error = %e, "Failed to remove rejected upload");
    }
}

#[tracing::instrument(
    skip(state, command),
    fields(workspace_id = %command.workspace_id, user_id = %command.user_id)
)]
pub async fn handle(
    state: &FeatureState,
    command: UploadImportCommand,
) -> Result<ImportJob, UploadImportError> {
    let entity_type = command.validate(state.max_upload_bytes)?;
    let file = command.file.ok_or(UploadImportError::FileRequired)?;

    let stored = state
        .storage
        .save(&file.content)
        .await
        .map_err(UploadImportError::Storage)?;

    let job = match ImportJob::new(
        command.workspace_id,
        command.user_id,
        entity_type,
        file.file_name,
        stored.path_string(),
        i64::try_from(stored.size).unwrap_or(i64::MAX),
    ) {
        Ok(job) => job,
        Err(e) => {
            discard(&state.storage, &stored).await;
            return Err(e.into());
        },
    };

    if let Err(e) = state.repository.save_job(&job).await {
        error!(job_id = %job.id(), error = %e, "Failed to save import job");
        discard(&state.storage, &stored).await;
        return Err(e.into());
    }

    let message = ImportProcessMessage::new(job.id(), job.workspace_id());
    if let Err(e) = state.queue.enqueue(IMPORT_PROCESS_TOPIC, &message).await {
        error!(job_id = %job.id(), error = %e, "Failed to enqueue import job; job left pending");
        return Err(e.into());
    }

    info!(
        job_id = %job.id(),
        entity_type = %job.entity_type(),
        file_name = %job.file_name(),
        size = job.file_size_bytes(),
        "Import job accepted"
    );

    Ok(job)
}
