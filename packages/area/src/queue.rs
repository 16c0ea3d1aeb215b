use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The shared FIFO of serialized jobs. Producers prepend, consumers remove
/// from the tail; `pop` never blocks - an empty queue is a normal result
/// and the worker backs off on its own.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError>;

    async fn pop(&self) -> Result<Option<Vec<u8>>, QueueError>;
}

/// The production queue: one named redis list shared by every evaluator and
/// worker, on this node or any other.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    queue_name: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, queue_name: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            queue_name: queue_name.into(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError> {
        // ConnectionManager is a cheap handle over one multiplexed connection
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.queue_name, payload).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Vec<u8>>, QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = conn.rpop(&self.queue_name, None).await?;
        Ok(payload)
    }
}

/// In-process queue with the same left-push/right-pop shape. Used by the
/// integration tests and handy for single-node setups without redis.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<VecDeque<Vec<u8>>>,
}

impl MemoryQueue {
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
impl JobQueue for MemoryQueue {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError> {
        self.inner.lock().unwrap().push_front(payload.to_vec());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Vec<u8>>, QueueError> {
        Ok(self.inner.lock().unwrap().pop_back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_queue_is_fifo() {
        let queue = MemoryQueue::new();
        queue.push(b"first").await.unwrap();
        queue.push(b"second").await.unwrap();

        assert_eq!(queue.pop().await.unwrap().unwrap(), b"first");
        assert_eq!(queue.pop().await.unwrap().unwrap(), b"second");
        assert_eq!(queue.pop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_producers_lose_nothing() {
        let queue = Arc::new(MemoryQueue::new());

        let mut handles = Vec::new();
        for producer in 0..4u8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25u8 {
                    queue.push(&[producer, i]).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.len(), 100);

        // per-producer order is preserved even though producers interleave
        let mut seen: std::collections::HashMap<u8, Vec<u8>> = Default::default();
        while let Some(payload) = queue.pop().await.unwrap() {
            seen.entry(payload[0]).or_default().push(payload[1]);
        }
        for (_, items) in seen {
            let mut sorted = items.clone();
            sorted.sort();
            assert_eq!(items, sorted);
        }
    }
}
