//! Import worker
//!
//! Consumes `import.process` messages and drives each job through its
//! lifecycle: claim, read the stored file, parse the header, hand every row
//! to a [`RowImporter`], record rejected rows as [`ImportError`]s, report
//! progress, and finish with one terminal transition.
//!
//! Rows never abort a job. Only problems with the file as a whole (cannot be
//! read, no usable header) or with the infrastructure fail it.
//!
//! Every write after the claim is guarded on the job still being
//! `processing`. When the guard rejects a write the user has cancelled or
//! deleted the job (or the sweeper gave up on it), and the worker stops
//! without touching the row again.

use anyhow::Result;
use csv::{ReaderBuilder, StringRecord};
use std::sync::Arc;
use std::time::Duration;
use stockroom_common::{ImportProcessMessage, ImportStatus, IMPORT_PROCESS_TOPIC};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::importer::{CsvRow, RowContext, RowImporter};
use super::models::{ImportError, ImportJob, RowData};
use super::queue::QueueConsumer;
use super::repository::ImportJobRepository;
use crate::config::ImportConfig;
use crate::storage::UploadStorage;

/// Message recorded for a file whose header row is empty.
const EMPTY_HEADER_MESSAGE: &str = "CSV file has no header row";

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    /// Rows between progress writes and cancellation checks
    pub progress_interval: usize,
}

impl From<&ImportConfig> for WorkerSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            progress_interval: config.progress_interval,
        }
    }
}

/// How handling a single message ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Failed,
    /// The stored job left `processing` under the worker, or was deleted
    Cancelled,
    /// Job was missing or not pending, so nothing was claimed
    Skipped,
}

pub struct ImportWorker {
    repository: Arc<dyn ImportJobRepository>,
    consumer: Arc<dyn QueueConsumer>,
    storage: UploadStorage,
    importer: Arc<dyn RowImporter>,
    settings: WorkerSettings,
}

impl ImportWorker {
    pub fn new(
        repository: Arc<dyn ImportJobRepository>,
        consumer: Arc<dyn QueueConsumer>,
        storage: UploadStorage,
        importer: Arc<dyn RowImporter>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            repository,
            consumer,
            storage,
            importer,
            settings,
        }
    }

    /// Poll the queue in a background task until `shutdown` flips to true
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
                progress_interval = self.settings.progress_interval,
                "Import worker started"
            );

            while !*shutdown.borrow() {
                match self.poll_once().await {
                    Ok(true) => continue,
                    Ok(false) => {},
                    Err(e) => error!(error = %e, "Import worker poll failed"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {},
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                }
            }

            info!("Import worker stopped");
        })
    }

    /// Handle at most one queued message; returns whether one was available
    ///
    /// A message is acknowledged once handled, including when its payload is
    /// malformed. Errors before a job is claimed leave it leased so it is
    /// redelivered later.
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(message) = self.consumer.dequeue(IMPORT_PROCESS_TOPIC).await? else {
            return Ok(false);
        };

        match message.decode::<ImportProcessMessage>() {
            Ok(payload) => {
                let outcome = self.process(payload).await?;
                debug!(message_id = message.id, ?outcome, "Import message handled");
            },
            Err(e) => {
                warn!(
                    message_id = message.id,
                    attempts = message.attempts,
                    error = %e,
                    "Dropping malformed import message"
                );
            },
        }

        self.consumer.ack(message.id).await?;
        Ok(true)
    }

    /// Claim and run one import job
    #[tracing::instrument(
        skip(self),
        fields(job_id = %message.import_job_id, workspace_id = %message.workspace_id)
    )]
    pub async fn process(&self, message: ImportProcessMessage) -> Result<ProcessOutcome> {
        let claimed = self
            .repository
            .claim_job(message.import_job_id, message.workspace_id)
            .await?;

        let Some(mut job) = claimed else {
            info!("Import job is not pending, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        info!(entity_type = %job.entity_type(), file = %job.file_name(), "Import job claimed");

        match self.run(&mut job).await {
            Ok(outcome) => {
                info!(
                    ?outcome,
                    processed = job.processed_rows(),
                    succeeded = job.success_count(),
                    failed = job.error_count(),
                    "Import job finished"
                );
                Ok(outcome)
            },
            Err(e) => {
                error!(error = %e, "Import job aborted");
                Ok(self.fail_job(&mut job, format!("import aborted: {}", e)).await)
            },
        }
    }

    async fn run(&self, job: &mut ImportJob) -> Result<ProcessOutcome> {
        let data = match self.storage.read(job.file_path()).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(self
                    .fail_job(job, format!("could not read import file: {:#}", e))
                    .await);
            },
        };

        let mut reader = ReaderBuilder::new().from_reader(data.as_slice());

        let headers = match reader.headers() {
            Ok(raw) => normalize_headers(raw),
            Err(e) => {
                return Ok(self
                    .fail_job(job, format!("could not parse CSV header: {}", e))
                    .await);
            },
        };

        if headers.iter().all(str::is_empty) {
            let error = ImportError::new(job.id(), 0, None, EMPTY_HEADER_MESSAGE, None)?;
            self.repository.save_error(&error).await?;
            return Ok(self.fail_job(job, EMPTY_HEADER_MESSAGE.to_string()).await);
        }

        let records: Vec<csv::Result<StringRecord>> = reader.records().collect();
        let total_rows = i32::try_from(records.len()).unwrap_or(i32::MAX);

        job.start(total_rows)?;
        if !self.persist(job).await? {
            return Ok(ProcessOutcome::Cancelled);
        }
        info!(total_rows, columns = headers.len(), "Import started");

        let context = RowContext {
            job_id: job.id(),
            workspace_id: job.workspace_id(),
            user_id: job.user_id(),
            entity_type: job.entity_type(),
        };
        let interval = self.settings.progress_interval.max(1);
        let (mut processed, mut succeeded, mut failed) = (0i32, 0i32, 0i32);

        for (index, record) in records.iter().enumerate() {
            let row_number = i32::try_from(index + 1).unwrap_or(i32::MAX);

            let rejection = match record {
                Ok(record) => {
                    let row = CsvRow::new(&headers, record);
                    match self.importer.import_row(&context, &row).await {
                        Ok(()) => None,
                        Err(failure) => {
                            Some((failure.field_name, failure.message, Some(row.to_row_data())))
                        },
                    }
                },
                Err(e) => Some((None, format!("malformed CSV row: {}", e), None)),
            };

            processed += 1;
            match rejection {
                None => succeeded += 1,
                Some((field_name, message, row_data)) => {
                    failed += 1;
                    self.record_row_error(job, row_number, field_name, message, row_data)
                        .await?;
                },
            }

            if processed as usize % interval == 0 {
                job.update_progress(processed, succeeded, failed)?;
                if !self.persist(job).await? {
                    return Ok(ProcessOutcome::Cancelled);
                }
                debug!(processed, succeeded, failed, progress = job.progress(), "Import progress");
            }
        }

        job.update_progress(processed, succeeded, failed)?;
        job.complete()?;
        if !self.persist(job).await? {
            return Ok(ProcessOutcome::Cancelled);
        }

        Ok(ProcessOutcome::Completed)
    }

    async fn record_row_error(
        &self,
        job: &ImportJob,
        row_number: i32,
        field_name: Option<String>,
        message: String,
        row_data: Option<RowData>,
    ) -> Result<()> {
        let message = if message.is_empty() {
            "row rejected".to_string()
        } else {
            message
        };

        let error = ImportError::new(job.id(), row_number, field_name, message, row_data)?;
        self.repository.save_error(&error).await?;
        Ok(())
    }

    /// Write a claimed job back; `false` once someone else took it over
    async fn persist(&self, job: &ImportJob) -> Result<bool> {
        let applied = self
            .repository
            .update_job(job, ImportStatus::Processing)
            .await?;

        if !applied {
            info!(
                job_id = %job.id(),
                processed = job.processed_rows(),
                "Import job was cancelled or removed, stopping"
            );
        }
        Ok(applied)
    }

    /// Best-effort whole-job failure
    ///
    /// Reports `Cancelled` when the guarded write finds the job cancelled or
    /// deleted, in which case nothing is written.
    async fn fail_job(&self, job: &mut ImportJob, message: String) -> ProcessOutcome {
        warn!(job_id = %job.id(), reason = %message, "Failing import job");

        let expected = job.status();
        if let Err(e) = job.fail(message) {
            warn!(job_id = %job.id(), error = %e, "Import job could not be failed");
            return ProcessOutcome::Failed;
        }

        match self.repository.update_job(job, expected).await {
            Ok(true) => ProcessOutcome::Failed,
            Ok(false) => {
                info!(job_id = %job.id(), "Import job was cancelled or removed, leaving it untouched");
                ProcessOutcome::Cancelled
            },
            Err(e) => {
                error!(job_id = %job.id(), error = %e, "Failed to persist import job failure");
                ProcessOutcome::Failed
            },
        }
    }
}

/// Trim and lowercase header names, dropping a leading byte order mark
fn normalize_headers(raw: &StringRecord) -> StringRecord {
    raw.iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect()
}
