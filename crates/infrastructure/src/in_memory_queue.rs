use async_trait::async_trait;
use sentinel_core::{
    traits::{TaskDelivery, TaskDeliveryStream, TaskQueue},
    SentinelError, SentinelResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

/// 内存任务队列实现
///
/// Mirrors the broker semantics the consumer relies on: per-consumer prefetch,
/// manual ack, reject with or without requeue, and redelivery of anything that
/// was handed out but never settled (dropped deliveries count as a lost consumer).
#[derive(Clone, Default)]
pub struct InMemoryTaskQueue {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    acked: Vec<Vec<u8>>,
    dead: Vec<Vec<u8>>,
    next_tag: u64,
    closed: bool,
}

#[derive(Clone)]
struct QueuedMessage {
    body: Vec<u8>,
    redelivered: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panicking test thread must not wedge every other consumer.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settle(&self, tag: u64, outcome: Settlement) {
        let mut state = self.lock();
        if let Some(message) = state.unacked.remove(&tag) {
            match outcome {
                Settlement::Ack => state.acked.push(message.body),
                Settlement::Reject { requeue: false } => state.dead.push(message.body),
                Settlement::Reject { requeue: true } | Settlement::Lost => {
                    state.ready.push_front(QueuedMessage {
                        body: message.body,
                        redelivered: true,
                    });
                }
            }
        }
        drop(state);
        self.notify.notify_waiters();
    }
}

enum Settlement {
    Ack,
    Reject { requeue: bool },
    Lost,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an arbitrary body, including ones that are not task ids.
    pub fn publish_raw(&self, body: impl Into<Vec<u8>>) {
        self.shared.lock().ready.push_back(QueuedMessage {
            body: body.into(),
            redelivered: false,
        });
        self.shared.notify.notify_waiters();
    }

    /// Messages waiting to be handed out.
    pub fn ready_len(&self) -> usize {
        self.shared.lock().ready.len()
    }

    /// Messages handed out and not yet settled.
    pub fn unacked_len(&self) -> usize {
        self.shared.lock().unacked.len()
    }

    /// Bodies acknowledged so far, in ack order.
    pub fn acked(&self) -> Vec<String> {
        Self::as_strings(&self.shared.lock().acked)
    }

    /// Bodies rejected without requeue.
    pub fn dead_lettered(&self) -> Vec<String> {
        Self::as_strings(&self.shared.lock().dead)
    }

    fn as_strings(bodies: &[Vec<u8>]) -> Vec<String> {
        bodies
            .iter()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .collect()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn publish_task(&self, task_id: i64) -> SentinelResult<()> {
        if self.shared.lock().closed {
            return Err(SentinelError::MessageQueue("队列已关闭".to_string()));
        }
        self.publish_raw(task_id.to_string());
        debug!("任务 {} 已发布到内存队列", task_id);
        Ok(())
    }

    async fn subscribe(&self, prefetch: u16) -> SentinelResult<Box<dyn TaskDeliveryStream>> {
        Ok(Box::new(InMemoryDeliveryStream {
            shared: self.shared.clone(),
            prefetch: usize::from(prefetch.max(1)),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }))
    }

    async fn close(&self) -> SentinelResult<()> {
        self.shared.lock().closed = true;
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

struct InMemoryDeliveryStream {
    shared: Arc<Shared>,
    prefetch: usize,
    outstanding: Arc<AtomicUsize>,
}

impl InMemoryDeliveryStream {
    fn try_take(&self) -> Option<InMemoryDelivery> {
        if self.outstanding.load(Ordering::SeqCst) >= self.prefetch {
            return None;
        }
        let mut state = self.shared.lock();
        let message = state.ready.pop_front()?;
        let tag = state.next_tag;
        state.next_tag += 1;
        state.unacked.insert(tag, message.clone());
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        Some(InMemoryDelivery {
            shared: self.shared.clone(),
            outstanding: self.outstanding.clone(),
            tag,
            body: message.body,
            redelivered: message.redelivered,
            settled: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TaskDeliveryStream for InMemoryDeliveryStream {
    async fn next_delivery(&mut self) -> Option<SentinelResult<Box<dyn TaskDelivery>>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.lock().closed {
                return None;
            }
            if let Some(delivery) = self.try_take() {
                return Some(Ok(Box::new(delivery)));
            }

            notified.await;
        }
    }
}

struct InMemoryDelivery {
    shared: Arc<Shared>,
    outstanding: Arc<AtomicUsize>,
    tag: u64,
    body: Vec<u8>,
    redelivered: bool,
    settled: AtomicUsize,
}

impl InMemoryDelivery {
    fn finish(&self, outcome: Settlement) -> SentinelResult<()> {
        if self.settled.swap(1, Ordering::SeqCst) != 0 {
            return Err(SentinelError::MessageQueue(format!(
                "消息 {} 已被确认或拒绝",
                self.tag
            )));
        }
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.shared.settle(self.tag, outcome);
        Ok(())
    }
}

#[async_trait]
impl TaskDelivery for InMemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(&self) -> SentinelResult<()> {
        self.finish(Settlement::Ack)
    }

    async fn reject(&self, requeue: bool) -> SentinelResult<()> {
        self.finish(Settlement::Reject { requeue })
    }
}

impl Drop for InMemoryDelivery {
    fn drop(&mut self) {
        if *self.settled.get_mut() == 0 {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            self.shared.settle(self.tag, Settlement::Lost);
        }
    }
}
