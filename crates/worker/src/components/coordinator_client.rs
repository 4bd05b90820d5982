use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use sentinel_core::{
    models::{
        HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse, ReportJobRequest,
        ReportJobResponse,
    },
    SentinelError, SentinelResult,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const HEARTBEAT_PATH: &str = "/api/agents/heartbeat";

/// Both halves of an open heartbeat stream.
///
/// Dropping the channel tears the underlying connection down.
pub struct HeartbeatChannel {
    pub sender: mpsc::Sender<HeartbeatRequest>,
    pub receiver: mpsc::Receiver<SentinelResult<HeartbeatResponse>>,
    pub guard: ConnectionGuard,
}

impl HeartbeatChannel {
    /// A channel with no background connection behind it.
    pub fn new(
        sender: mpsc::Sender<HeartbeatRequest>,
        receiver: mpsc::Receiver<SentinelResult<HeartbeatResponse>>,
    ) -> Self {
        Self {
            sender,
            receiver,
            guard: ConnectionGuard::default(),
        }
    }
}

/// Aborts the reader and writer tasks of a heartbeat connection on drop.
#[derive(Default)]
pub struct ConnectionGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Agent side view of the coordinator.
#[async_trait]
pub trait CoordinatorTransport: Send + Sync {
    /// Check that the coordinator is reachable.
    async fn connect(&self) -> SentinelResult<()>;

    /// Register and return the assigned agent id.
    async fn register(&self, hostname: &str, address: &str) -> SentinelResult<String>;

    async fn open_heartbeat(&self) -> SentinelResult<HeartbeatChannel>;

    async fn report(&self, report: &ReportJobRequest) -> SentinelResult<()>;
}

/// HTTP + WebSocket client for the coordinator surface.
pub struct HttpCoordinatorClient {
    base_url: String,
    http_client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpCoordinatorClient {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            connect_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `http(s)://host/...` becomes `ws(s)://host/api/agents/heartbeat`.
    pub fn heartbeat_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}{HEARTBEAT_PATH}")
    }

    async fn error_from(response: reqwest::Response, what: &str) -> SentinelError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SentinelError::Network(format!("{what}失败: HTTP {status} - {body}"))
    }
}

#[async_trait]
impl CoordinatorTransport for HttpCoordinatorClient {
    async fn connect(&self) -> SentinelResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| SentinelError::Network(format!("连接协调服务失败: {e}")))?;

        if response.status().is_success() {
            debug!("Coordinator reachable at {}", self.base_url);
            Ok(())
        } else {
            Err(Self::error_from(response, "协调服务健康检查").await)
        }
    }

    async fn register(&self, hostname: &str, address: &str) -> SentinelResult<String> {
        let url = format!("{}/api/agents/register", self.base_url);
        let request = RegisterRequest {
            hostname: hostname.to_string(),
            address: address.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| SentinelError::Network(format!("注册请求失败: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Agent注册").await);
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| SentinelError::Protocol(format!("注册响应无法解析: {e}")))?;
        if !body.success {
            return Err(SentinelError::Protocol("协调服务拒绝了注册".to_string()));
        }

        info!(agent_id = %body.agent_id, "Registered with coordinator");
        Ok(body.agent_id)
    }

    async fn open_heartbeat(&self) -> SentinelResult<HeartbeatChannel> {
        let url = self.heartbeat_url();
        let (socket, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SentinelError::Network(format!("心跳连接超时: {url}")))?
            .map_err(|e| SentinelError::Network(format!("心跳连接失败: {e}")))?;
        let (mut sink, mut stream) = socket.split();

        let (request_tx, mut request_rx) = mpsc::channel::<HeartbeatRequest>(8);
        let (response_tx, response_rx) = mpsc::channel::<SentinelResult<HeartbeatResponse>>(8);

        let writer = tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode heartbeat");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn!(error = %e, "Heartbeat send failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let response = match frame {
                    Ok(Message::Text(text)) => {
                        serde_json::from_str::<HeartbeatResponse>(text.as_str()).map_err(|e| {
                            SentinelError::Protocol(format!("心跳响应无法解析: {e}"))
                        })
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => Err(SentinelError::Network(format!("心跳连接中断: {e}"))),
                };
                let failed = response.is_err();
                if response_tx.send(response).await.is_err() || failed {
                    break;
                }
            }
        });

        info!(url = %url, "Heartbeat stream open");
        Ok(HeartbeatChannel {
            sender: request_tx,
            receiver: response_rx,
            guard: ConnectionGuard {
                tasks: vec![writer, reader],
            },
        })
    }

    async fn report(&self, report: &ReportJobRequest) -> SentinelResult<()> {
        let url = format!("{}/api/jobs/report", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(report)
            .send()
            .await
            .map_err(|e| SentinelError::Network(format!("上报作业结果失败: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "作业结果上报").await);
        }

        let body: ReportJobResponse = response
            .json()
            .await
            .map_err(|e| SentinelError::Protocol(format!("上报响应无法解析: {e}")))?;
        if body.received {
            Ok(())
        } else {
            Err(SentinelError::Protocol("协调服务未接收作业结果".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_url_from_http_base() {
        let client = HttpCoordinatorClient::new("http://127.0.0.1:9090/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://127.0.0.1:9090");
        assert_eq!(
            client.heartbeat_url(),
            "ws://127.0.0.1:9090/api/agents/heartbeat"
        );
    }

    #[test]
    fn test_heartbeat_url_from_https_base() {
        let client = HttpCoordinatorClient::new("https://coord.internal", Duration::from_secs(1));
        assert_eq!(
            client.heartbeat_url(),
            "wss://coord.internal/api/agents/heartbeat"
        );
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            HttpCoordinatorClient::new(format!("http://127.0.0.1:{port}"), Duration::from_secs(1));
        assert!(client.connect().await.is_err());
    }
}
