use async_trait::async_trait;

use crate::errors::SentinelResult;

/// One unacknowledged message handed out by the broker.
#[async_trait]
pub trait TaskDelivery: Send + Sync {
    fn body(&self) -> &[u8];

    /// Whether the broker has handed this message out before.
    fn redelivered(&self) -> bool;

    async fn ack(&self) -> SentinelResult<()>;

    /// Reject the message. With `requeue = false` the broker drops it.
    async fn reject(&self, requeue: bool) -> SentinelResult<()>;
}

/// Stream of deliveries from a single consumer subscription.
#[async_trait]
pub trait TaskDeliveryStream: Send {
    /// `None` once the subscription is closed.
    async fn next_delivery(&mut self) -> Option<SentinelResult<Box<dyn TaskDelivery>>>;
}

/// 任务队列抽象接口
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish a task reference (its id as text).
    async fn publish_task(&self, task_id: i64) -> SentinelResult<()>;

    /// Open a consumer with at most `prefetch` unacknowledged deliveries.
    async fn subscribe(&self, prefetch: u16) -> SentinelResult<Box<dyn TaskDeliveryStream>>;

    async fn close(&self) -> SentinelResult<()>;
}
