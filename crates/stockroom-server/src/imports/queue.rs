//! Background work queue
//!
//! The upload path only sees [`JobQueue`]: publish a typed message under a
//! topic. The worker consumes through [`QueueConsumer`]. [`PgJobQueue`]
//! backs both with a `queue_messages` table so several worker processes can
//! share one queue using `FOR UPDATE SKIP LOCKED`.
//!
//! Delivery is at-least-once: a dequeued message is leased, and if it is not
//! acknowledged before the lease expires another worker receives it again.
//! Consumers guard against duplicates with the repository's claim step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use stockroom_common::ImportProcessMessage;

/// Default time a dequeued message stays invisible to other consumers.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue payload could not be encoded or decoded: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Producer side used by the upload path
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, topic: &str, message: &ImportProcessMessage) -> Result<(), QueueError>;
}

/// Consumer side used by the import worker
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Lease the oldest available message on `topic`, if any
    async fn dequeue(&self, topic: &str) -> Result<Option<QueuedMessage>, QueueError>;

    /// Remove a handled message so it is never redelivered
    async fn ack(&self, message_id: i64) -> Result<(), QueueError>;
}

/// A leased message and its raw payload
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedMessage {
    pub id: i64,
    pub topic: String,
    pub payload: Value,
    /// Deliveries so far, including this one
    pub attempts: i32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Serialize a message into the payload stored on the queue
pub fn encode<T: Serialize>(message: &T) -> Result<Value, QueueError> {
    Ok(serde_json::to_value(message)?)
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
    lease: Duration,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease: DEFAULT_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    #[tracing::instrument(skip(self, message), fields(job_id = %message.import_job_id))]
    async fn enqueue(&self, topic: &str, message: &ImportProcessMessage) -> Result<(), QueueError> {
        let payload = encode(message)?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO queue_messages (topic, payload) VALUES ($1, $2) RETURNING id",
        )
        .bind(topic)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(message_id = id, "Message enqueued");
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for PgJobQueue {
    async fn dequeue(&self, topic: &str) -> Result<Option<QueuedMessage>, QueueError> {
        let lease_secs = self.lease.as_secs_f64();

        let message = sqlx::query_as::<_, QueuedMessage>(
            r#"
            UPDATE queue_messages
            SET locked_at = NOW(),
                attempts = attempts + 1
            WHERE id = (
                SELECT id
                FROM queue_messages
                WHERE topic = $1
                  AND (locked_at IS NULL OR locked_at < NOW() - make_interval(secs => $2))
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, topic, payload, attempts, enqueued_at
            "#,
        )
        .bind(topic)
        .bind(lease_secs)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn ack(&self, message_id: i64) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM queue_messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
