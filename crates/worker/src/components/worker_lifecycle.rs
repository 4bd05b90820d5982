use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{config::AgentConfig, models::JobKind, ExecutorRegistry, SentinelResult};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use super::{
    CoordinatorTransport, HeartbeatManager, HttpCoordinatorClient, SessionEnd,
    TaskExecutionManager,
};
use crate::executors::{ShellExecutor, TcpProbeExecutor};

/// Connection state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connecting,
    Registering,
    HeartbeatActive,
    Reconnecting,
    Stopped,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Disconnected => "disconnected",
            AgentState::Connecting => "connecting",
            AgentState::Registering => "registering",
            AgentState::HeartbeatActive => "heartbeat_active",
            AgentState::Reconnecting => "reconnecting",
            AgentState::Stopped => "stopped",
        }
    }
}

/// Agent execution loop.
///
/// `Disconnected -> Connecting -> Registering -> HeartbeatActive`, and on any
/// stream failure `Reconnecting -> Connecting` after a fixed delay. Registration
/// retries forever. The loop only exits on shutdown.
pub struct WorkerLifecycle {
    transport: Arc<dyn CoordinatorTransport>,
    executions: TaskExecutionManager,
    hostname: String,
    config: AgentConfig,
    state_tx: watch::Sender<AgentState>,
    agent_id: Option<String>,
}

impl WorkerLifecycle {
    pub fn new(
        transport: Arc<dyn CoordinatorTransport>,
        registry: ExecutorRegistry,
        hostname: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        let executions = TaskExecutionManager::new(
            registry,
            transport.clone(),
            config.execution_timeout(),
            config.report_timeout(),
        );
        let (state_tx, _) = watch::channel(AgentState::Disconnected);

        Self {
            transport,
            executions,
            hostname: hostname.into(),
            config,
            state_tx,
            agent_id: None,
        }
    }

    /// HTTP transport, shell and probe executors, hostname from config or the OS.
    pub fn from_config(config: AgentConfig) -> SentinelResult<Self> {
        let transport = Arc::new(HttpCoordinatorClient::new(
            config.server_url.clone(),
            config.connect_timeout(),
        ));
        let registry = ExecutorRegistry::new()
            .with(JobKind::Shell, Arc::new(ShellExecutor::new()))
            .with(JobKind::Probe, Arc::new(TcpProbeExecutor::new()));
        let hostname = resolve_hostname(&config);

        Ok(Self::new(transport, registry, hostname, config))
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> AgentState {
        *self.state_tx.borrow()
    }

    /// Id assigned by the last successful registration.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn transition(&self, next: AgentState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!(from = previous.as_str(), to = next.as_str(), "Agent state changed");
        }
    }

    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(hostname = %self.hostname, server = %self.config.server_url, "Agent starting");
        self.transition(AgentState::Disconnected);
        let mut state = AgentState::Connecting;

        loop {
            self.transition(state);
            state = match state {
                AgentState::Disconnected | AgentState::Connecting => {
                    tokio::select! {
                        result = tokio::time::timeout(self.config.connect_timeout(), self.transport.connect()) => {
                            match result {
                                Ok(Ok(())) => AgentState::Registering,
                                Ok(Err(e)) => {
                                    warn!(error = %e, "Coordinator unreachable");
                                    AgentState::Reconnecting
                                }
                                Err(_) => {
                                    warn!("Coordinator connect timed out");
                                    AgentState::Reconnecting
                                }
                            }
                        }
                        _ = shutdown_rx.recv() => AgentState::Stopped,
                    }
                }
                AgentState::Registering => self.register(&mut shutdown_rx).await,
                AgentState::HeartbeatActive => self.heartbeat(&mut shutdown_rx).await,
                AgentState::Reconnecting => {
                    if self
                        .pause(self.config.reconnect_delay(), &mut shutdown_rx)
                        .await
                    {
                        AgentState::Connecting
                    } else {
                        AgentState::Stopped
                    }
                }
                AgentState::Stopped => break,
            };
        }

        info!("Agent stopped");
    }

    async fn register(&mut self, shutdown_rx: &mut broadcast::Receiver<()>) -> AgentState {
        loop {
            let result = tokio::select! {
                result = self.transport.register(&self.hostname, &self.config.address) => result,
                _ = shutdown_rx.recv() => return AgentState::Stopped,
            };

            match result {
                Ok(agent_id) => {
                    info!(agent_id = %agent_id, "Agent registered");
                    self.agent_id = Some(agent_id);
                    return AgentState::HeartbeatActive;
                }
                Err(e) => {
                    warn!(error = %e, "Registration failed, retrying");
                    if !self
                        .pause(self.config.register_retry_delay(), shutdown_rx)
                        .await
                    {
                        return AgentState::Stopped;
                    }
                }
            }
        }
    }

    async fn heartbeat(&mut self, shutdown_rx: &mut broadcast::Receiver<()>) -> AgentState {
        let Some(agent_id) = self.agent_id.clone() else {
            return AgentState::Registering;
        };

        let channel = tokio::select! {
            result = self.transport.open_heartbeat() => result,
            _ = shutdown_rx.recv() => return AgentState::Stopped,
        };
        let channel = match channel {
            Ok(channel) => channel,
            Err(e) => {
                error!(error = %e, "Failed to open heartbeat stream");
                return AgentState::Reconnecting;
            }
        };

        let manager = HeartbeatManager::new(
            agent_id,
            self.config.heartbeat_interval(),
            self.executions.clone(),
        );
        match manager.run_session(channel, shutdown_rx).await {
            SessionEnd::Disconnected(_) => AgentState::Reconnecting,
            SessionEnd::Shutdown => AgentState::Stopped,
        }
    }

    /// Sleep unless shutdown arrives first. Returns `false` on shutdown.
    async fn pause(&self, delay: Duration, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown_rx.recv() => false,
        }
    }
}

pub fn resolve_hostname(config: &AgentConfig) -> String {
    config
        .hostname
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            hostname::get()
                .ok()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_hostname_wins() {
        let config = AgentConfig {
            hostname: Some("agent-7".to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(resolve_hostname(&config), "agent-7");
    }

    #[test]
    fn test_blank_hostname_falls_back_to_os() {
        let config = AgentConfig {
            hostname: Some("  ".to_string()),
            ..AgentConfig::default()
        };
        assert!(!resolve_hostname(&config).trim().is_empty());
    }

    #[test]
    fn test_from_config_starts_disconnected() {
        let lifecycle = WorkerLifecycle::from_config(AgentConfig::default()).unwrap();
        assert_eq!(lifecycle.state(), AgentState::Disconnected);
        assert!(lifecycle.agent_id().is_none());
    }
}
