//! JSON representations of import jobs and row errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_common::{EntityType, ImportStatus};
use uuid::Uuid;

use crate::imports::{ImportError, ImportJob, RowData};

/// Job as returned to clients; the storage path stays server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobResponse {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: EntityType,
    pub status: ImportStatus,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub total_rows: Option<i32>,
    pub processed_rows: i32,
    pub success_count: i32,
    pub error_count: i32,
    /// Whole-number percentage of rows processed
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ImportJob> for ImportJobResponse {
    fn from(job: &ImportJob) -> Self {
        Self {
            id: job.id(),
            workspace_id: job.workspace_id(),
            user_id: job.user_id(),
            entity_type: job.entity_type(),
            status: job.status(),
            file_name: job.file_name().to_string(),
            file_size_bytes: job.file_size_bytes(),
            total_rows: job.total_rows(),
            processed_rows: job.processed_rows(),
            success_count: job.success_count(),
            error_count: job.error_count(),
            progress: job.progress(),
            started_at: job.started_at(),
            completed_at: job.completed_at(),
            error_message: job.error_message().map(str::to_string),
            created_at: job.created_at(),
            updated_at: job.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportErrorResponse {
    pub id: Uuid,
    pub import_job_id: Uuid,
    pub row_number: i32,
    pub field_name: Option<String>,
    pub error_message: String,
    pub row_data: Option<RowData>,
    pub created_at: DateTime<Utc>,
}

impl From<&ImportError> for ImportErrorResponse {
    fn from(error: &ImportError) -> Self {
        Self {
            id: error.id(),
            import_job_id: error.import_job_id(),
            row_number: error.row_number(),
            field_name: error.field_name().map(str::to_string),
            error_message: error.error_message().to_string(),
            row_data: error.row_data().cloned(),
            created_at: error.created_at(),
        }
    }
}
