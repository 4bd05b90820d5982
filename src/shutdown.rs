use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Fans a single stop signal out to every running component.
///
/// Triggering is idempotent. A receiver subscribed after the trigger fires
/// immediately.
#[derive(Clone)]
pub struct ShutdownManager {
    /// `None` once shutdown has been triggered.
    sender: Arc<RwLock<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        match self.sender.read().await.as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                let _ = sender.send(());
                receiver
            }
        }
    }

    pub async fn shutdown(&self) {
        let Some(sender) = self.sender.write().await.take() else {
            debug!("Shutdown already triggered");
            return;
        };

        info!(subscribers = sender.receiver_count(), "Triggering shutdown");
        let _ = sender.send(());
    }

    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.subscribe().await;
        let _ = receiver.recv().await;
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
