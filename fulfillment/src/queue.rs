use crate::error::{Error, Result};
use crate::model::ModelId;
use async_trait::async_trait;
use pgmq::{Message, PGMQueue};
use std::collections::VecDeque;
use std::sync::Mutex;
use strum_macros::Display;

/// Queue of order ids whose reward side effects still have to run.
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn enqueue(&self, order_id: ModelId) -> Result<()>;

    /// Next pending order id together with the message id to acknowledge.
    async fn fetch_next(&self) -> Result<Option<(ModelId, i64)>>;

    async fn mark_processed(&self, msg_id: i64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum QueueName {
    #[strum(to_string = "rewards_queue")]
    Rewards,
}

/// Postgres-backed queue (pgmq). Messages invisible to other consumers for
/// the visibility timeout become visible again when not archived, so a
/// crashed worker's task is retried instead of lost.
pub struct PgmqQueue {
    queue: PGMQueue,
    queue_name: QueueName,
}

const VISIBILITY_TIMEOUT_SECONDS: i32 = 30;

impl PgmqQueue {
    pub async fn new(database_url: &str, queue_name: QueueName) -> Result<Self> {
        let queue = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        queue
            .create(&queue_name.to_string())
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        tracing::info!(queue = %queue_name, "queue ready");
        Ok(Self { queue, queue_name })
    }
}

#[async_trait]
impl QueueService for PgmqQueue {
    async fn enqueue(&self, order_id: ModelId) -> Result<()> {
        self.queue
            .send(&self.queue_name.to_string(), &order_id)
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        Ok(())
    }

    async fn fetch_next(&self) -> Result<Option<(ModelId, i64)>> {
        let received: Option<Message<ModelId>> = self
            .queue
            .read::<ModelId>(
                &self.queue_name.to_string(),
                Some(VISIBILITY_TIMEOUT_SECONDS),
            )
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        Ok(received.map(|msg| (msg.message, msg.msg_id)))
    }

    async fn mark_processed(&self, msg_id: i64) -> Result<()> {
        self.queue
            .archive(&self.queue_name.to_string(), msg_id)
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        Ok(())
    }
}

/// Process-local queue for single-binary deployments and tests. One-shot:
/// a fetched message is gone even if processing fails.
#[derive(Default)]
pub struct InMemoryQueue {
    inner: Mutex<VecDeque<ModelId>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn enqueue(&self, order_id: ModelId) -> Result<()> {
        self.inner.lock().unwrap().push_back(order_id);
        Ok(())
    }

    async fn fetch_next(&self) -> Result<Option<(ModelId, i64)>> {
        Ok(self.inner.lock().unwrap().pop_front().map(|id| (id, id)))
    }

    async fn mark_processed(&self, _msg_id: i64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_queue_is_fifo() {
        let queue = InMemoryQueue::new();
        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();
        assert_eq!(queue.fetch_next().await.unwrap(), Some((1, 1)));
        assert_eq!(queue.fetch_next().await.unwrap(), Some((2, 2)));
        assert_eq!(queue.fetch_next().await.unwrap(), None);
    }
}
