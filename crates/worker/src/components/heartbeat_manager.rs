use std::time::Duration;

use sentinel_core::models::HeartbeatRequest;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{HeartbeatChannel, TaskExecutionManager};

/// Why a heartbeat session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Stream broke. The caller reconnects.
    Disconnected(String),
    Shutdown,
}

/// Drives one heartbeat session: a sender loop on a fixed interval and a
/// receiver loop that hands delivered jobs to the execution manager.
/// Whichever loop fails first ends the session.
pub struct HeartbeatManager {
    agent_id: String,
    heartbeat_interval: Duration,
    executions: TaskExecutionManager,
}

impl HeartbeatManager {
    pub fn new(
        agent_id: impl Into<String>,
        heartbeat_interval: Duration,
        executions: TaskExecutionManager,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            heartbeat_interval,
            executions,
        }
    }

    pub async fn run_session(
        &self,
        channel: HeartbeatChannel,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SessionEnd {
        let HeartbeatChannel {
            sender,
            mut receiver,
            guard: _guard,
        } = channel;

        let send_loop = async {
            let mut ticker = interval(self.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let request = HeartbeatRequest {
                    agent_id: self.agent_id.clone(),
                    running_jobs: self.executions.running_jobs(),
                    cpu_usage: None,
                };
                if sender.send(request).await.is_err() {
                    return "heartbeat stream closed while sending".to_string();
                }
                debug!(agent_id = %self.agent_id, "Heartbeat sent");
            }
        };

        let receive_loop = async {
            loop {
                match receiver.recv().await {
                    Some(Ok(response)) => {
                        if response.config_outdated {
                            debug!("Coordinator reports outdated config");
                        }
                        if let Some(job) = response.job {
                            info!(job_id = %job.job_id, "Job received");
                            self.executions.spawn_job(&self.agent_id, job);
                        }
                    }
                    Some(Err(e)) => return e.to_string(),
                    None => return "heartbeat stream closed by coordinator".to_string(),
                }
            }
        };

        tokio::select! {
            reason = send_loop => {
                warn!(reason = %reason, "Heartbeat session ended");
                SessionEnd::Disconnected(reason)
            }
            reason = receive_loop => {
                warn!(reason = %reason, "Heartbeat session ended");
                SessionEnd::Disconnected(reason)
            }
            _ = shutdown_rx.recv() => {
                info!("Heartbeat session stopping for shutdown");
                SessionEnd::Shutdown
            }
        }
    }
}
