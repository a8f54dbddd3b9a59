//! Import job and row error entities
//!
//! An [`ImportJob`] tracks one uploaded CSV file from acceptance to a terminal
//! state. Row-level problems found while processing are stored as
//! [`ImportError`] records owned by the job; they never abort the job itself.
//!
//! Lifecycle transitions are explicit and checked:
//!
//! ```text
//! pending --start/claim--> processing --complete--> completed
//! pending --cancel--> cancelled   processing --fail--> failed
//! pending --fail--> failed        processing --cancel--> cancelled
//! ```
//!
//! Terminal jobs reject every transition with
//! [`DomainError::InvalidTransition`].

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use stockroom_common::{EntityType, ImportStatus};
use tracing::warn;
use uuid::Uuid;

/// Raw key/value snapshot of an offending CSV row
pub type RowData = serde_json::Map<String, Value>;

/// Maximum number of columns kept in a [`RowData`] snapshot.
pub const MAX_ROW_DATA_FIELDS: usize = 64;

/// Maximum length, in characters, of a single snapshot value.
pub const MAX_ROW_DATA_VALUE_CHARS: usize = 512;

/// Validation and state errors raised by the entities
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("invalid state transition: cannot {action} a {from} import job")]
    InvalidTransition {
        from: ImportStatus,
        action: &'static str,
    },
}

/// Tracked bulk import of one uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportJob {
    id: Uuid,
    workspace_id: Uuid,
    user_id: Uuid,
    entity_type: EntityType,
    status: ImportStatus,
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

/// Every stored field of an [`ImportJob`], used to rebuild one from storage
#[derive(Debug, Clone)]
pub struct ImportJobParts {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: EntityType,
    pub status: ImportStatus,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub total_rows: Option<i32>,
    pub processed_rows: i32,
    pub success_count: i32,
    pub error_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// Create a pending job for a freshly stored upload
    ///
    /// Fields are checked in declaration order and the first failure names
    /// the offending field.
    pub fn new(
        workspace_id: Uuid,
        user_id: Uuid,
        entity_type: EntityType,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        file_size_bytes: i64,
    ) -> Result<Self, DomainError> {
        let file_name = file_name.into();
        let file_path = file_path.into();

        if workspace_id.is_nil() {
            return Err(DomainError::InvalidInput("workspace_id"));
        }
        if user_id.is_nil() {
            return Err(DomainError::InvalidInput("user_id"));
        }
        if file_name.is_empty() {
            return Err(DomainError::InvalidInput("file_name"));
        }
        if file_path.is_empty() {
            return Err(DomainError::InvalidInput("file_path"));
        }
        if file_size_bytes <= 0 {
            return Err(DomainError::InvalidInput("file_size_bytes"));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            workspace_id,
            user_id,
            entity_type,
            status: ImportStatus::Pending,
            file_name,
            file_path,
            file_size_bytes,
            total_rows: None,
            processed_rows: 0,
            success_count: 0,
            error_count: 0,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a job from persisted state without re-validating it
    pub fn from_parts(parts: ImportJobParts) -> Self {
        Self {
            id: parts.id,
            workspace_id: parts.workspace_id,
            user_id: parts.user_id,
            entity_type: parts.entity_type,
            status: parts.status,
            file_name: parts.file_name,
            file_path: parts.file_path,
            file_size_bytes: parts.file_size_bytes,
            total_rows: parts.total_rows,
            processed_rows: parts.processed_rows,
            success_count: parts.success_count,
            error_count: parts.error_count,
            started_at: parts.started_at,
            completed_at: parts.completed_at,
            error_message: parts.error_message,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Move to `processing` with a known row count
    ///
    /// Re-applying `start` to a processing job resets `total_rows` and
    /// `started_at`, which lets redelivered work restart cleanly.
    pub fn start(&mut self, total_rows: i32) -> Result<(), DomainError> {
        let now = self.transition(
            "start",
            &[ImportStatus::Pending, ImportStatus::Processing],
            ImportStatus::Processing,
        )?;
        self.total_rows = Some(total_rows);
        self.started_at = Some(now);
        Ok(())
    }

    /// Take ownership of a pending job before its row count is known
    ///
    /// Mirrors the repository's compare-and-swap claim: only a pending job
    /// can be claimed, so a redelivered message finds nothing to do.
    pub fn claim(&mut self) -> Result<(), DomainError> {
        let now = self.transition("claim", &[ImportStatus::Pending], ImportStatus::Processing)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Record live counters without changing status
    pub fn update_progress(
        &mut self,
        processed_rows: i32,
        success_count: i32,
        error_count: i32,
    ) -> Result<(), DomainError> {
        self.transition(
            "update progress of",
            &[ImportStatus::Processing],
            ImportStatus::Processing,
        )?;
        self.processed_rows = processed_rows;
        self.success_count = success_count;
        self.error_count = error_count;
        Ok(())
    }

    /// Finish processing; partial row failures still complete the job
    pub fn complete(&mut self) -> Result<(), DomainError> {
        let now = self.transition("complete", &[ImportStatus::Processing], ImportStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Abort the whole job, e.g. when the file cannot be parsed at all
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<(), DomainError> {
        let now = self.transition(
            "fail",
            &[ImportStatus::Pending, ImportStatus::Processing],
            ImportStatus::Failed,
        )?;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark the job cancelled; an in-flight worker notices between batches
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        let now = self.transition(
            "cancel",
            &[ImportStatus::Pending, ImportStatus::Processing],
            ImportStatus::Cancelled,
        )?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Percentage of rows processed, rounded down
    pub fn progress(&self) -> i32 {
        match self.total_rows {
            Some(total) if total > 0 => {
                i32::try_from(i64::from(self.processed_rows) * 100 / i64::from(total))
                    .unwrap_or(i32::MAX)
            },
            _ => 0,
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed_from: &[ImportStatus],
        to: ImportStatus,
    ) -> Result<DateTime<Utc>, DomainError> {
        if self.status.is_terminal() || !allowed_from.contains(&self.status) {
            warn!(
                job_id = %self.id,
                from = %self.status,
                action,
                "Rejected import job transition"
            );
            return Err(DomainError::InvalidTransition {
                from: self.status,
                action,
            });
        }

        self.status = to;
        Ok(self.touch())
    }

    /// Advance `updated_at`, strictly, even when the clock has not moved
    fn touch(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        self.updated_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn status(&self) -> ImportStatus {
        self.status
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn file_size_bytes(&self) -> i64 {
        self.file_size_bytes
    }

    pub fn total_rows(&self) -> Option<i32> {
        self.total_rows
    }

    pub fn processed_rows(&self) -> i32 {
        self.processed_rows
    }

    pub fn success_count(&self) -> i32 {
        self.success_count
    }

    pub fn error_count(&self) -> i32 {
        self.error_count
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Diagnostic for one problematic input row
///
/// Row 0 is reserved for header-level problems. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportError {
    id: Uuid,
    import_job_id: Uuid,
    row_number: i32,
    field_name: Option<String>,
    error_message: String,
    row_data: Option<RowData>,
    created_at: DateTime<Utc>,
}

/// Every stored field of an [`ImportError`]
#[derive(Debug, Clone)]
pub struct ImportErrorParts {
    pub id: Uuid,
    pub import_job_id: Uuid,
    pub row_number: i32,
    pub field_name: Option<String>,
    pub error_message: String,
    pub row_data: Option<RowData>,
    pub created_at: DateTime<Utc>,
}

impl ImportError {
    /// Build a row error; `row_data` is trimmed to the snapshot bounds
    pub fn new(
        import_job_id: Uuid,
        row_number: i32,
        field_name: Option<String>,
        error_message: impl Into<String>,
        row_data: Option<RowData>,
    ) -> Result<Self, DomainError> {
        let error_message = error_message.into();

        if import_job_id.is_nil() {
            return Err(DomainError::InvalidInput("import_job_id"));
        }
        if row_number < 0 {
            return Err(DomainError::InvalidInput("row_number"));
        }
        if error_message.is_empty() {
            return Err(DomainError::InvalidInput("error_message"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            import_job_id,
            row_number,
            field_name,
            error_message,
            row_data: row_data.map(bound_row_data),
            created_at: Utc::now(),
        })
    }

    pub fn from_parts(parts: ImportErrorParts) -> Self {
        Self {
            id: parts.id,
            import_job_id: parts.import_job_id,
            row_number: parts.row_number,
            field_name: parts.field_name,
            error_message: parts.error_message,
            row_data: parts.row_data,
            created_at: parts.created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn import_job_id(&self) -> Uuid {
        self.import_job_id
    }

    pub fn row_number(&self) -> i32 {
        self.row_number
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn row_data(&self) -> Option<&RowData> {
        self.row_data.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Cap a row snapshot so pathological files cannot bloat error storage
pub fn bound_row_data(row_data: RowData) -> RowData {
    row_data
        .into_iter()
        .take(MAX_ROW_DATA_FIELDS)
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) if text.chars().count() > MAX_ROW_DATA_VALUE_CHARS => {
                    Value::String(text.chars().take(MAX_ROW_DATA_VALUE_CHARS).collect())
                },
                other => other,
            };
            (key, value)
        })
        .collect()
}
