//! PostgreSQL integration tests for the import repository and queue
//!
//! Run with a database available:
//!
//! ```text
//! DATABASE_URL=postgresql://localhost/stockroom cargo test --test import_repository_tests -- --ignored
//! ```

use serde_json::json;
use sqlx::PgPool;
use stockroom_common::{EntityType, ImportProcessMessage, ImportStatus, IMPORT_PROCESS_TOPIC};
use stockroom_server::imports::{
    ImportError, ImportJob, ImportJobRepository, JobQueue, PgImportJobRepository, PgJobQueue,
    QueueConsumer,
};
use uuid::Uuid;

fn new_job(workspace_id: Uuid) -> ImportJob {
    ImportJob::new(
        workspace_id,
        Uuid::new_v4(),
        EntityType::Items,
        "items.csv",
        format!("/var/lib/stockroom/uploads/{}.csv", Uuid::new_v4()),
        512,
    )
    .unwrap()
}

// ============================================================================
// Jobs
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_save_and_find_job_is_workspace_scoped(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();

    let found = repo.find_job_by_id(job.id(), job.workspace_id()).await.unwrap();
    assert_eq!(found.id(), job.id());
    assert_eq!(found.status(), ImportStatus::Pending);
    assert_eq!(found.entity_type(), EntityType::Items);
    assert_eq!(found.file_path(), job.file_path());
    assert!(found.total_rows().is_none());

    let err = repo.find_job_by_id(job.id(), Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_job_writes_lifecycle_fields_while_status_matches(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();

    let mut job = repo.claim_job(job.id(), job.workspace_id()).await.unwrap().unwrap();
    job.start(100).unwrap();
    job.update_progress(50, 45, 5).unwrap();
    assert!(repo.update_job(&job, ImportStatus::Processing).await.unwrap());

    let found = repo.find_job_by_id(job.id(), job.workspace_id()).await.unwrap();
    assert_eq!(found.status(), ImportStatus::Processing);
    assert_eq!(found.total_rows(), Some(100));
    assert_eq!(found.progress(), 50);
    assert_eq!(found.success_count(), 45);
    assert_eq!(found.error_count(), 5);
    assert!(found.started_at().is_some());

    job.complete().unwrap();
    assert!(repo.update_job(&job, ImportStatus::Processing).await.unwrap());
    let found = repo.find_job_by_id(job.id(), job.workspace_id()).await.unwrap();
    assert_eq!(found.status(), ImportStatus::Completed);
    assert!(found.completed_at().is_some());

    // Stored status is no longer processing.
    assert!(!repo.update_job(&job, ImportStatus::Processing).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_job_never_recreates_a_deleted_job(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();
    let mut job = repo.claim_job(job.id(), job.workspace_id()).await.unwrap().unwrap();

    repo.delete_errors_by_job_id(job.id()).await.unwrap();
    repo.delete_job(job.id()).await.unwrap();

    job.fail("import aborted").unwrap();
    assert!(!repo.update_job(&job, ImportStatus::Processing).await.unwrap());
    assert!(repo
        .find_job_by_id(job.id(), job.workspace_id())
        .await
        .unwrap_err()
        .is_not_found());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_cancel_job_keeps_counters_and_wins_over_worker(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();

    let mut running = repo.claim_job(job.id(), job.workspace_id()).await.unwrap().unwrap();
    running.start(10).unwrap();
    running.update_progress(4, 3, 1).unwrap();
    assert!(repo.update_job(&running, ImportStatus::Processing).await.unwrap());

    let cancelled = repo.cancel_job(job.id(), job.workspace_id()).await.unwrap().unwrap();
    assert_eq!(cancelled.status(), ImportStatus::Cancelled);
    assert_eq!(cancelled.processed_rows(), 4);
    assert_eq!(cancelled.error_count(), 1);
    assert!(cancelled.completed_at().is_some());
    assert!(cancelled.updated_at() > running.updated_at());

    running.update_progress(10, 9, 1).unwrap();
    running.complete().unwrap();
    assert!(!repo.update_job(&running, ImportStatus::Processing).await.unwrap());

    assert!(repo.cancel_job(job.id(), job.workspace_id()).await.unwrap().is_none());
    assert!(repo.cancel_job(job.id(), Uuid::new_v4()).await.unwrap().is_none());
    let found = repo.find_job_by_id(job.id(), job.workspace_id()).await.unwrap();
    assert_eq!(found.status(), ImportStatus::Cancelled);
    assert_eq!(found.processed_rows(), 4);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_claim_job_succeeds_once(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();

    let claimed = repo.claim_job(job.id(), job.workspace_id()).await.unwrap().unwrap();
    assert_eq!(claimed.status(), ImportStatus::Processing);
    assert!(claimed.started_at().is_some());
    assert!(claimed.updated_at() > job.updated_at());

    assert!(repo.claim_job(job.id(), job.workspace_id()).await.unwrap().is_none());
    assert!(repo.claim_job(Uuid::new_v4(), job.workspace_id()).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_find_jobs_by_workspace_pages_newest_first(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let workspace_id = Uuid::new_v4();
    let mut ids = Vec::new();
    for _ in 0..5 {
        let job = new_job(workspace_id);
        repo.save_job(&job).await.unwrap();
        ids.push(job.id());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    repo.save_job(&new_job(Uuid::new_v4())).await.unwrap();

    let (page, total) = repo.find_jobs_by_workspace(workspace_id, 2, 0).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id(), ids[4]);

    let (page, _) = repo.find_jobs_by_workspace(workspace_id, 2, 4).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id(), ids[0]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_find_jobs_by_status(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let pending = new_job(Uuid::new_v4());
    let mut running = new_job(Uuid::new_v4());
    running.start(10).unwrap();
    repo.save_job(&pending).await.unwrap();
    repo.save_job(&running).await.unwrap();

    let found = repo.find_jobs_by_status(ImportStatus::Processing, 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), running.id());
}

// ============================================================================
// Errors
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_errors_must_be_deleted_before_job(pool: PgPool) {
    let repo = PgImportJobRepository::new(pool);
    let job = new_job(Uuid::new_v4());
    repo.save_job(&job).await.unwrap();

    let mut row = serde_json::Map::new();
    row.insert("name".to_string(), json!(""));
    repo.save_error(
        &ImportError::new(job.id(), 4, Some("name".to_string()), "name is required", Some(row))
            .unwrap(),
    )
    .await
    .unwrap();
    repo.save_error(&ImportError::new(job.id(), 0, None, "CSV file has no header row", None).unwrap())
        .await
        .unwrap();

    let errors = repo.find_errors_by_job_id(job.id()).await.unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].row_number(), 0);
    assert_eq!(errors[1].field_name(), Some("name"));
    assert_eq!(errors[1].row_data().unwrap()["name"], json!(""));

    assert!(repo.delete_job(job.id()).await.is_err());

    repo.delete_errors_by_job_id(job.id()).await.unwrap();
    repo.delete_job(job.id()).await.unwrap();
    assert!(repo.find_errors_by_job_id(job.id()).await.unwrap().is_empty());
    assert!(repo.delete_job(job.id()).await.unwrap_err().is_not_found());
}

// ============================================================================
// Queue
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_queue_leases_and_acks_messages(pool: PgPool) {
    let queue = PgJobQueue::new(pool);
    let message = ImportProcessMessage::new(Uuid::new_v4(), Uuid::new_v4());
    queue.enqueue(IMPORT_PROCESS_TOPIC, &message).await.unwrap();

    let delivered = queue.dequeue(IMPORT_PROCESS_TOPIC).await.unwrap().unwrap();
    assert_eq!(delivered.attempts, 1);
    assert_eq!(delivered.decode::<ImportProcessMessage>().unwrap(), message);

    assert!(queue.dequeue(IMPORT_PROCESS_TOPIC).await.unwrap().is_none());
    assert!(queue.dequeue("other.topic").await.unwrap().is_none());

    queue.ack(delivered.id).await.unwrap();
    assert!(queue.dequeue(IMPORT_PROCESS_TOPIC).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_expired_lease_is_redelivered(pool: PgPool) {
    let queue = PgJobQueue::new(pool).with_lease(std::time::Duration::ZERO);
    let message = ImportProcessMessage::new(Uuid::new_v4(), Uuid::new_v4());
    queue.enqueue(IMPORT_PROCESS_TOPIC, &message).await.unwrap();

    let first = queue.dequeue(IMPORT_PROCESS_TOPIC).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let second = queue.dequeue(IMPORT_PROCESS_TOPIC).await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.attempts, 2);
}
