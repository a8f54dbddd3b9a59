//! Persistence for import jobs and their row errors
//!
//! [`ImportJobRepository`] is the contract the upload path, the query
//! surface and the worker depend on. [`PgImportJobRepository`] implements it
//! over PostgreSQL with runtime-checked queries and `FromRow` records that
//! are converted into entities at the boundary.
//!
//! Every workspace-scoped lookup filters on `workspace_id`, so asking for
//! another tenant's job is indistinguishable from asking for a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use stockroom_common::ImportStatus;
use uuid::Uuid;

use super::models::{ImportError, ImportErrorParts, ImportJob, ImportJobParts};
use crate::db::{DbError, DbResult};

const JOB_RESOURCE: &str = "import job";

const JOB_COLUMNS: &str = "id, workspace_id, user_id, entity_type, status, file_name, file_path, \
     file_size_bytes, total_rows, processed_rows, success_count, error_count, started_at, \
     completed_at, error_message, created_at, updated_at";

#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// Insert or update a job by id; identity columns are never rewritten
    ///
    /// Only the upload path calls this, to record a new job. Anything that
    /// may race with another writer goes through [`update_job`] or
    /// [`cancel_job`] instead, so a deleted job is never written back.
    ///
    /// [`update_job`]: ImportJobRepository::update_job
    /// [`cancel_job`]: ImportJobRepository::cancel_job
    async fn save_job(&self, job: &ImportJob) -> DbResult<()>;

    /// Write the job's lifecycle fields if the stored row is still `expected`
    ///
    /// Returns `false` when the row is gone or has moved to another status
    /// (cancelled by the user, failed by the sweeper); nothing is written.
    async fn update_job(&self, job: &ImportJob, expected: ImportStatus) -> DbResult<bool>;

    /// Atomically cancel a pending or processing job
    ///
    /// Only status and timestamps change, so counters written by a running
    /// worker survive. `None` when the job is missing or already terminal.
    async fn cancel_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>>;

    async fn find_job_by_id(&self, id: Uuid, workspace_id: Uuid) -> DbResult<ImportJob>;

    /// One page of a workspace's jobs, newest first, plus the total count
    async fn find_jobs_by_workspace(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<ImportJob>, i64)>;

    /// Jobs in `status` across all workspaces, least recently updated first
    async fn find_jobs_by_status(&self, status: ImportStatus, limit: i64) -> DbResult<Vec<ImportJob>>;

    async fn delete_job(&self, id: Uuid) -> DbResult<()>;

    /// Atomically move a pending job to processing
    ///
    /// Returns `None` when the job is missing or no longer pending, which is
    /// how a second delivery of the same message loses the race.
    async fn claim_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>>;

    async fn save_error(&self, error: &ImportError) -> DbResult<()>;

    /// All errors of a job ordered by row number
    async fn find_errors_by_job_id(&self, job_id: Uuid) -> DbResult<Vec<ImportError>>;

    async fn delete_errors_by_job_id(&self, job_id: Uuid) -> DbResult<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct ImportJobRecord {
    id: Uuid,
    workspace_id: Uuid,
    user_id: Uuid,
    entity_type: String,
    status: String,
    file_name: String,
    file_path: String,
    file_size_bytes: i64,
    total_rows: Option<i32>,
    processed_rows: i32,
    success_count: i32,
    error_count: i32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ImportJobRecord> for ImportJob {
    type Error = DbError;

    fn try_from(record: ImportJobRecord) -> Result<Self, Self::Error> {
        Ok(ImportJob::from_parts(ImportJobParts {
            id: record.id,
            workspace_id: record.workspace_id,
            user_id: record.user_id,
            entity_type: record.entity_type.parse()?,
            status: record.status.parse()?,
            file_name: record.file_name,
            file_path: record.file_path,
            file_size_bytes: record.file_size_bytes,
            total_rows: record.total_rows,
            processed_rows: record.processed_rows,
            success_count: record.success_count,
            error_count: record.error_count,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImportErrorRecord {
    id: Uuid,
    import_job_id: Uuid,
    row_number: i32,
    field_name: Option<String>,
    error_message: String,
    row_data: Option<Value>,
    created_at: DateTime<Utc>,
}

impl From<ImportErrorRecord> for ImportError {
    fn from(record: ImportErrorRecord) -> Self {
        let row_data = match record.row_data {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        ImportError::from_parts(ImportErrorParts {
            id: record.id,
            import_job_id: record.import_job_id,
            row_number: record.row_number,
            field_name: record.field_name,
            error_message: record.error_message,
            row_data,
            created_at: record.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgImportJobRepository {
    pool: PgPool,
}

impl PgImportJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportJobRepository for PgImportJobRepository {
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id(), status = %job.status()))]
    async fn save_job(&self, job: &ImportJob) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_jobs (
                id, workspace_id, user_id, entity_type, status, file_name, file_path,
                file_size_bytes, total_rows, processed_rows, success_count, error_count,
                started_at, completed_at, error_message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                total_rows = EXCLUDED.total_rows,
                processed_rows = EXCLUDED.processed_rows,
                success_count = EXCLUDED.success_count,
                error_count = EXCLUDED.error_count,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(job.id())
        .bind(job.workspace_id())
        .bind(job.user_id())
        .bind(job.entity_type().as_str())
        .bind(job.status().as_str())
        .bind(job.file_name())
        .bind(job.file_path())
        .bind(job.file_size_bytes())
        .bind(job.total_rows())
        .bind(job.processed_rows())
        .bind(job.success_count())
        .bind(job.error_count())
        .bind(job.started_at())
        .bind(job.completed_at())
        .bind(job.error_message())
        .bind(job.created_at())
        .bind(job.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id(), status = %job.status()))]
    async fn update_job(&self, job: &ImportJob, expected: ImportStatus) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = $3,
                total_rows = $4,
                processed_rows = $5,
                success_count = $6,
                error_count = $7,
                started_at = $8,
                completed_at = $9,
                error_message = $10,
                updated_at = $11
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(job.id())
        .bind(expected.as_str())
        .bind(job.status().as_str())
        .bind(job.total_rows())
        .bind(job.processed_rows())
        .bind(job.success_count())
        .bind(job.error_count())
        .bind(job.started_at())
        .bind(job.completed_at())
        .bind(job.error_message())
        .bind(job.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>> {
        let query = format!(
            r#"
            UPDATE import_jobs
            SET status = 'cancelled',
                completed_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond'),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND workspace_id = $2 AND status IN ('pending', 'processing')
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        sqlx::query_as::<_, ImportJobRecord>(&query)
            .bind(id)
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ImportJob::try_from)
            .transpose()
    }

    async fn find_job_by_id(&self, id: Uuid, workspace_id: Uuid) -> DbResult<ImportJob> {
        let query = format!(
            "SELECT {} FROM import_jobs WHERE id = $1 AND workspace_id = $2",
            JOB_COLUMNS
        );

        let record = sqlx::query_as::<_, ImportJobRecord>(&query)
            .bind(id)
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(JOB_RESOURCE, id))?;

        record.try_into()
    }

    async fn find_jobs_by_workspace(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<ImportJob>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM import_jobs WHERE workspace_id = $1")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;

        let query = format!(
            "SELECT {} FROM import_jobs WHERE workspace_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
            JOB_COLUMNS
        );

        let jobs = sqlx::query_as::<_, ImportJobRecord>(&query)
            .bind(workspace_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ImportJob::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        Ok((jobs, total))
    }

    async fn find_jobs_by_status(&self, status: ImportStatus, limit: i64) -> DbResult<Vec<ImportJob>> {
        let query = format!(
            "SELECT {} FROM import_jobs WHERE status = $1 ORDER BY updated_at LIMIT $2",
            JOB_COLUMNS
        );

        sqlx::query_as::<_, ImportJobRecord>(&query)
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ImportJob::try_from)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn delete_job(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM import_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(JOB_RESOURCE, id));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn claim_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>> {
        let query = format!(
            r#"
            UPDATE import_jobs
            SET status = 'processing',
                started_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond'),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND workspace_id = $2 AND status = 'pending'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        sqlx::query_as::<_, ImportJobRecord>(&query)
            .bind(id)
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ImportJob::try_from)
            .transpose()
    }

    async fn save_error(&self, error: &ImportError) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_errors (
                id, import_job_id, row_number, field_name, error_message, row_data, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(error.id())
        .bind(error.import_job_id())
        .bind(error.row_number())
        .bind(error.field_name())
        .bind(error.error_message())
        .bind(error.row_data().cloned().map(Value::Object))
        .bind(error.created_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_errors_by_job_id(&self, job_id: Uuid) -> DbResult<Vec<ImportError>> {
        let records = sqlx::query_as::<_, ImportErrorRecord>(
            r#"
            SELECT id, import_job_id, row_number, field_name, error_message, row_data, created_at
            FROM import_errors
            WHERE import_job_id = $1
            ORDER BY row_number, created_at
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(ImportError::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_errors_by_job_id(&self, job_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM import_errors WHERE import_job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(deleted = result.rows_affected(), "Deleted import errors");
        Ok(())
    }
}
