//! In-memory repository and queue for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use stockroom_common::{ImportProcessMessage, ImportStatus};
use uuid::Uuid;

use super::models::{ImportError, ImportJob};
use super::queue::{encode, JobQueue, QueueConsumer, QueueError, QueuedMessage};
use super::repository::ImportJobRepository;
use crate::db::{DbError, DbResult};

/// Runs against the stored job right before a matching guarded update
type UpdateHook = Box<dyn FnOnce(&mut HashMap<Uuid, ImportJob>, Uuid) + Send>;

#[derive(Default)]
struct RepositoryState {
    jobs: HashMap<Uuid, ImportJob>,
    errors: Vec<ImportError>,
    calls: Vec<&'static str>,
    fail_saves: bool,
    update_hook: Option<(ImportStatus, UpdateHook)>,
}

/// Repository fake that enforces the error → job foreign key and logs calls
#[derive(Default)]
pub struct InMemoryImportJobRepository {
    state: Mutex<RepositoryState>,
}

impl InMemoryImportJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }

    /// Interleave another writer: `hook` runs on the stored jobs just before
    /// the next `update_job` that writes a job in status `when`
    pub fn before_update_to(
        &self,
        when: ImportStatus,
        hook: impl FnOnce(&mut HashMap<Uuid, ImportJob>, Uuid) + Send + 'static,
    ) {
        self.state.lock().unwrap().update_hook = Some((when, Box::new(hook)));
    }

    /// Store a job directly, bypassing call logging and failure injection
    pub fn insert_job(&self, job: ImportJob) {
        self.state.lock().unwrap().jobs.insert(job.id(), job);
    }

    pub fn insert_error(&self, error: ImportError) {
        self.state.lock().unwrap().errors.push(error);
    }

    pub fn job(&self, id: Uuid) -> Option<ImportJob> {
        self.state.lock().unwrap().jobs.get(&id).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn errors_for(&self, job_id: Uuid) -> Vec<ImportError> {
        let mut errors: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .errors
            .iter()
            .filter(|e| e.import_job_id() == job_id)
            .cloned()
            .collect();
        errors.sort_by_key(|e| e.row_number());
        errors
    }

    /// Names of the mutating calls made so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }
}

fn injected_failure() -> DbError {
    DbError::Sqlx(sqlx::Error::Protocol("injected save failure".to_string()))
}

#[async_trait]
impl ImportJobRepository for InMemoryImportJobRepository {
    async fn save_job(&self, job: &ImportJob) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("save_job");
        if state.fail_saves {
            return Err(injected_failure());
        }
        state.jobs.insert(job.id(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &ImportJob, expected: ImportStatus) -> DbResult<bool> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.calls.push("update_job");
        if state.fail_saves {
            return Err(injected_failure());
        }

        if matches!(&state.update_hook, Some((when, _)) if *when == job.status()) {
            if let Some((_, hook)) = state.update_hook.take() {
                hook(&mut state.jobs, job.id());
            }
        }

        let applied = state
            .jobs
            .get(&job.id())
            .is_some_and(|stored| stored.status() == expected);
        if applied {
            state.jobs.insert(job.id(), job.clone());
        }
        Ok(applied)
    }

    async fn cancel_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("cancel_job");
        let cancelled = state
            .jobs
            .get_mut(&id)
            .filter(|job| job.workspace_id() == workspace_id && !job.status().is_terminal())
            .and_then(|job| job.cancel().ok().map(|_| job.clone()));
        Ok(cancelled)
    }

    async fn find_job_by_id(&self, id: Uuid, workspace_id: Uuid) -> DbResult<ImportJob> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(&id)
            .filter(|job| job.workspace_id() == workspace_id)
            .cloned()
            .ok_or_else(|| DbError::not_found("import job", id))
    }

    async fn find_jobs_by_workspace(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<ImportJob>, i64)> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|job| job.workspace_id() == workspace_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(&b.id())));

        let total = jobs.len() as i64;
        let page = jobs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_jobs_by_status(&self, status: ImportStatus, limit: i64) -> DbResult<Vec<ImportJob>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|job| job.status() == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.updated_at());
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("delete_job");
        if state.errors.iter().any(|e| e.import_job_id() == id) {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "import_errors still reference import job".to_string(),
            )));
        }
        state
            .jobs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("import job", id))
    }

    async fn claim_job(&self, id: Uuid, workspace_id: Uuid) -> DbResult<Option<ImportJob>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("claim_job");
        let claimed = state
            .jobs
            .get_mut(&id)
            .filter(|job| job.workspace_id() == workspace_id)
            .and_then(|job| job.claim().ok().map(|_| job.clone()));
        Ok(claimed)
    }

    async fn save_error(&self, error: &ImportError) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("save_error");
        if state.fail_saves {
            return Err(injected_failure());
        }
        if !state.jobs.contains_key(&error.import_job_id()) {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "import_errors.import_job_id references a missing import job".to_string(),
            )));
        }
        state.errors.push(error.clone());
        Ok(())
    }

    async fn find_errors_by_job_id(&self, job_id: Uuid) -> DbResult<Vec<ImportError>> {
        Ok(self.errors_for(job_id))
    }

    async fn delete_errors_by_job_id(&self, job_id: Uuid) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("delete_errors_by_job_id");
        state.errors.retain(|e| e.import_job_id() != job_id);
        Ok(())
    }
}

#[derive(Default)]
struct QueueState {
    messages: VecDeque<QueuedMessage>,
    published: Vec<(String, ImportProcessMessage)>,
    acked: Vec<i64>,
    next_id: i64,
    unavailable: bool,
}

/// Queue fake recording everything published
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn published(&self) -> Vec<(String, ImportProcessMessage)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn acked(&self) -> Vec<i64> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    /// Queue an arbitrary payload, e.g. one the worker cannot decode
    pub fn push_raw(&self, topic: &str, payload: Value) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.messages.push_back(QueuedMessage {
            id,
            topic: topic.to_string(),
            payload,
            attempts: 0,
            enqueued_at: chrono::Utc::now(),
        });
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, topic: &str, message: &ImportProcessMessage) -> Result<(), QueueError> {
        if self.state.lock().unwrap().unavailable {
            return Err(QueueError::Unavailable("broker offline".to_string()));
        }
        self.push_raw(topic, encode(message)?);
        self.state
            .lock()
            .unwrap()
            .published
            .push((topic.to_string(), *message));
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for InMemoryQueue {
    async fn dequeue(&self, topic: &str) -> Result<Option<QueuedMessage>, QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(QueueError::Unavailable("broker offline".to_string()));
        }
        let position = state.messages.iter().position(|m| m.topic == topic);
        Ok(position
            .and_then(|index| state.messages.remove(index))
            .map(|mut message| {
                message.attempts += 1;
                message
            }))
    }

    async fn ack(&self, message_id: i64) -> Result<(), QueueError> {
        self.state.lock().unwrap().acked.push(message_id);
        Ok(())
    }
}
