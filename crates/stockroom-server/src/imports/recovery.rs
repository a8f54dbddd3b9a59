//! Stale job recovery
//!
//! A worker that dies mid-import leaves its job in `processing` forever.
//! The sweeper periodically fails processing jobs that have not reported
//! progress within the configured timeout so users see a terminal state.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use stockroom_common::ImportStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::repository::ImportJobRepository;

/// Jobs examined per sweep.
const SWEEP_BATCH_SIZE: i64 = 100;

pub struct StaleJobSweeper {
    repository: Arc<dyn ImportJobRepository>,
    timeout: Duration,
    interval: Duration,
}

impl StaleJobSweeper {
    pub fn new(repository: Arc<dyn ImportJobRepository>, timeout: Duration, interval: Duration) -> Self {
        Self {
            repository,
            timeout,
            interval,
        }
    }

    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                timeout_secs = self.timeout.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Stale import sweeper started"
            );

            while !*shutdown.borrow() {
                if let Err(e) = self.sweep_once().await {
                    error!(error = %e, "Stale import sweep failed");
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {},
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                }
            }

            info!("Stale import sweeper stopped");
        })
    }

    /// Fail every processing job idle longer than the timeout; returns how many
    pub async fn sweep_once(&self) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.timeout)?;
        let message = format!(
            "import stalled: no progress reported within {} seconds",
            self.timeout.as_secs()
        );

        let candidates = self
            .repository
            .find_jobs_by_status(ImportStatus::Processing, SWEEP_BATCH_SIZE)
            .await?;

        let mut failed = 0;
        for mut job in candidates.into_iter().filter(|job| job.updated_at() < cutoff) {
            if let Err(e) = job.fail(message.clone()) {
                warn!(job_id = %job.id(), error = %e, "Stale import job could not be failed");
                continue;
            }
            if !self
                .repository
                .update_job(&job, ImportStatus::Processing)
                .await?
            {
                debug!(job_id = %job.id(), "Stale import job moved on before the sweep, skipping");
                continue;
            }
            warn!(job_id = %job.id(), workspace_id = %job.workspace_id(), "Failed stalled import job");
            failed += 1;
        }

        if failed > 0 {
            info!(failed, "Stale import sweep finished");
        }

        Ok(failed)
    }
}
