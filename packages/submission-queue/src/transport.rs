//! `QueueTransport`: the queue boundary abstracted behind a narrow trait so
//! the subscriber, stale-job monitor, and DLQ monitor are unit-testable
//! without a live queue — the same separation `submission-db::DataAccess`
//! draws around Postgres. Grounded on
//! `original_source/backend/orchestration/subscriber.py`'s boto3 calls
//! (`receive_message`, `delete_message`, `send_message`,
//! `change_message_visibility`, `get_queue_attributes`), translated to
//! `aws-sdk-sqs`.

use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(String),
}

/// One received message plus the attributes the core cares about.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub approximate_receive_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct QueueDepth {
    pub visible: i64,
    pub in_flight: i64,
}

impl QueueDepth {
    pub fn total(&self) -> i64 {
        self.visible + self.in_flight
    }
}

/// Narrow surface over a durable at-least-once queue. One implementation
/// per queue provider; `AwsSqsTransport` is the only one shipped here.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<RawMessage>, QueueError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError>;

    /// Peek without consuming: reset visibility to 0 immediately after
    /// receiving, matching the DLQ monitor's "peek" semantics.
    async fn peek(&self, queue_url: &str, max_messages: i32) -> Result<Vec<RawMessage>, QueueError>;

    async fn depth(&self, queue_url: &str) -> Result<QueueDepth, QueueError>;
}
