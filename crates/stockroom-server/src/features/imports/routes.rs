//! Import API routes
//!
//! - `POST /api/v1/imports` - Upload a CSV file and queue it for import
//! - `GET /api/v1/imports` - List the workspace's import jobs
//! - `GET /api/v1/imports/:id` - Get one import job
//! - `GET /api/v1/imports/:id/errors` - Row-level errors of a job
//! - `POST /api/v1/imports/:id/cancel` - Cancel a pending or running job
//! - `DELETE /api/v1/imports/:id` - Delete a job, its errors and its file
//!
//! Every route requires the workspace context headers. Error bodies are
//! plain text.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{
    commands::{
        CancelImportCommand, CancelImportError, DeleteImportCommand, DeleteImportError,
        UploadImportCommand, UploadImportError, UploadedFile,
    },
    queries::{GetErrorsError, GetErrorsQuery, GetJobError, GetJobQuery, ListJobsError, ListJobsQuery},
    types::ImportJobResponse,
};
use crate::error::text_response;
use crate::features::shared::PaginationParams;
use crate::features::FeatureState;
use crate::middleware::WorkspaceContext;

pub fn imports_routes(max_upload_bytes: usize) -> Router<FeatureState> {
    Router::new()
        .route("/", post(upload_import).get(list_imports))
        .route("/:id", get(get_import).delete(delete_import))
        .route("/:id/errors", get(get_import_errors))
        .route("/:id/cancel", post(cancel_import))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// ============================================================================
// Command Handlers
// ============================================================================

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn multipart_error(e: MultipartError) -> UploadImportError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadImportError::BodyTooLarge
    } else {
        UploadImportError::InvalidMultipart(e.body_text())
    }
}

async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<UploadedFile>), UploadImportError> {
    let mut entity_type = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "entity_type" => {
                entity_type = Some(field.text().await.map_err(multipart_error)?);
            },
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(multipart_error)?;
                file = Some(UploadedFile {
                    file_name,
                    content: content.to_vec(),
                });
            },
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            },
        }
    }

    Ok((entity_type, file))
}

/// Upload a CSV file for import
///
/// Multipart fields: `entity_type` and `file`.
///
/// - `201 Created` - Job created and queued
/// - `400 Bad Request` - Validation error
/// - `401 Unauthorized` - Missing workspace context
/// - `500 Internal Server Error` - Storage, database or queue failure
#[tracing::instrument(skip(state, headers, multipart), fields(workspace_id = %ctx.workspace_id))]
async fn upload_import(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ImportApiError> {
    if declared_length(&headers).is_some_and(|len| len > state.max_upload_bytes) {
        return Err(UploadImportError::BodyTooLarge.into());
    }

    let (entity_type, file) = read_upload_form(multipart).await?;

    let command = UploadImportCommand {
        workspace_id: ctx.workspace_id,
        user_id: ctx.user_id,
        entity_type,
        file,
    };

    let job = super::commands::upload::handle(&state, command).await?;

    Ok((StatusCode::CREATED, Json(ImportJobResponse::from(&job))).into_response())
}

#[tracing::instrument(skip(state), fields(workspace_id = %ctx.workspace_id))]
async fn cancel_import(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ImportApiError> {
    let command = CancelImportCommand {
        id,
        workspace_id: ctx.workspace_id,
    };

    let job = super::commands::cancel::handle(&state, command).await?;

    Ok((StatusCode::OK, Json(ImportJobResponse::from(&job))).into_response())
}

/// Delete a job; `204 No Content` on success
#[tracing::instrument(skip(state), fields(workspace_id = %ctx.workspace_id))]
async fn delete_import(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ImportApiError> {
    let command = DeleteImportCommand {
        id,
        workspace_id: ctx.workspace_id,
    };

    super::commands::delete::handle(&state, command).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Query Handlers
// ============================================================================

/// List import jobs
///
/// `GET /api/v1/imports?page=1&limit=20`
#[tracing::instrument(skip(state), fields(workspace_id = %ctx.workspace_id))]
async fn list_imports(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ImportApiError> {
    let query = ListJobsQuery {
        workspace_id: ctx.workspace_id,
        pagination,
    };

    let response = super::queries::list_jobs::handle(&state, query).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip(state), fields(workspace_id = %ctx.workspace_id))]
async fn get_import(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ImportApiError> {
    let query = GetJobQuery {
        id,
        workspace_id: ctx.workspace_id,
    };

    let job = super::queries::get_job::handle(&state, query).await?;

    Ok((StatusCode::OK, Json(ImportJobResponse::from(&job))).into_response())
}

#[tracing::instrument(skip(state), fields(workspace_id = %ctx.workspace_id))]
async fn get_import_errors(
    State(state): State<FeatureState>,
    ctx: WorkspaceContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ImportApiError> {
    let query = GetErrorsQuery {
        job_id: id,
        workspace_id: ctx.workspace_id,
    };

    let response = super::queries::get_errors::handle(&state, query).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum ImportApiError {
    #[error(transparent)]
    Upload(#[from] UploadImportError),
    #[error(transparent)]
    Cancel(#[from] CancelImportError),
    #[error(transparent)]
    Delete(#[from] DeleteImportError),
    #[error(transparent)]
    List(#[from] ListJobsError),
    #[error(transparent)]
    Get(#[from] GetJobError),
    #[error(transparent)]
    GetErrors(#[from] GetErrorsError),
}

const NOT_FOUND_MESSAGE: &str = "import job not found";

impl ImportApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ImportApiError::Upload(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ImportApiError::Cancel(CancelImportError::NotFound)
            | ImportApiError::Delete(DeleteImportError::NotFound)
            | ImportApiError::Get(GetJobError::NotFound)
            | ImportApiError::GetErrors(GetErrorsError::NotFound) => StatusCode::NOT_FOUND,
            ImportApiError::Cancel(CancelImportError::InvalidTransition(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ImportApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match status {
            StatusCode::NOT_FOUND => NOT_FOUND_MESSAGE.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "Import request failed");
                "internal server error".to_string()
            },
            _ => self.to_string(),
        };

        text_response(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::imports::{DomainError, QueueError};
    use stockroom_common::ImportStatus;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ImportApiError::from(UploadImportError::BodyTooLarge), StatusCode::BAD_REQUEST),
            (
                ImportApiError::from(UploadImportError::InvalidJob(DomainError::InvalidInput(
                    "file_size_bytes",
                ))),
                StatusCode::BAD_REQUEST,
            ),
            (
                ImportApiError::from(UploadImportError::Queue(QueueError::Unavailable(
                    "down".to_string(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ImportApiError::from(GetJobError::NotFound), StatusCode::NOT_FOUND),
            (ImportApiError::from(DeleteImportError::NotFound), StatusCode::NOT_FOUND),
            (
                ImportApiError::from(CancelImportError::InvalidTransition(
                    DomainError::InvalidTransition {
                        from: ImportStatus::Completed,
                        action: "cancel",
                    },
                )),
                StatusCode::CONFLICT,
            ),
            (
                ImportApiError::from(ListJobsError::Database(DbError::config("pool closed"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
        }
    }
}
