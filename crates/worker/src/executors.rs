use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use sentinel_core::{
    traits::{ExecutionOutcome, JobExecutor},
    SentinelError, SentinelResult,
};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Ports checked by [`TcpProbeExecutor`] unless configured otherwise.
pub const DEFAULT_PROBE_PORTS: [u16; 6] = [80, 443, 8080, 22, 3306, 6379];

/// Runs the payload through `sh -c` and returns stdout followed by stderr.
///
/// The child is killed if the future is dropped, so a caller-side timeout
/// does not leave the process behind.
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(&self, _target: &str, payload: &str) -> SentinelResult<ExecutionOutcome> {
        info!(command = %payload, "Running shell job");

        let output = Command::new("sh")
            .arg("-c")
            .arg(payload)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SentinelError::TaskExecution(format!("启动Shell命令失败: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(ExecutionOutcome::success(combined))
        } else {
            Ok(ExecutionOutcome::failure(format!(
                "command failed: {}\noutput: {}",
                output.status, combined
            )))
        }
    }
}

/// TCP connect probe over a fixed port list.
///
/// Completing the sweep counts as success whether or not any port answered.
#[derive(Debug, Clone)]
pub struct TcpProbeExecutor {
    ports: Vec<u16>,
    dial_timeout: Duration,
}

impl Default for TcpProbeExecutor {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PROBE_PORTS.to_vec(),
            dial_timeout: Duration::from_secs(2),
        }
    }
}

impl TcpProbeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(ports: Vec<u16>, dial_timeout: Duration) -> Self {
        Self {
            ports,
            dial_timeout,
        }
    }

    async fn is_open(&self, host: &str, port: u16) -> bool {
        matches!(
            timeout(self.dial_timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl JobExecutor for TcpProbeExecutor {
    fn name(&self) -> &str {
        "tcp-probe"
    }

    async fn execute(&self, target: &str, _payload: &str) -> SentinelResult<ExecutionOutcome> {
        let host = target.trim();
        if host.is_empty() {
            return Err(SentinelError::TaskExecution("探测目标不能为空".to_string()));
        }

        let probes = self.ports.iter().map(|&port| async move {
            (port, self.is_open(host, port).await)
        });
        let open: Vec<String> = join_all(probes)
            .await
            .into_iter()
            .filter(|(_, open)| *open)
            .map(|(port, _)| port.to_string())
            .collect();

        debug!(target = %host, open = ?open, "Probe finished");

        if open.is_empty() {
            Ok(ExecutionOutcome::success("No open ports found"))
        } else {
            Ok(ExecutionOutcome::success(format!(
                "Open Ports: {}",
                open.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_shell_success_combines_output() {
        let outcome = ShellExecutor::new()
            .execute("localhost", "echo out; echo err 1>&2")
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.result.contains("out"));
        assert!(outcome.result.contains("err"));
    }

    #[tokio::test]
    async fn test_shell_nonzero_exit_is_failure() {
        let outcome = ShellExecutor::new()
            .execute("localhost", "echo partial; exit 3")
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.result.contains("partial"));
    }

    #[tokio::test]
    async fn test_probe_reports_open_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();

        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let probe =
            TcpProbeExecutor::with_ports(vec![open_port, closed_port], Duration::from_millis(500));
        let outcome = probe.execute("127.0.0.1", "").await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.result, format!("Open Ports: {open_port}"));
    }

    #[tokio::test]
    async fn test_probe_without_open_ports() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let probe = TcpProbeExecutor::with_ports(vec![closed_port], Duration::from_millis(500));
        let outcome = probe.execute("127.0.0.1", "").await.unwrap();
        assert_eq!(outcome.result, "No open ports found");
    }

    #[tokio::test]
    async fn test_probe_rejects_empty_target() {
        assert!(TcpProbeExecutor::new().execute("  ", "").await.is_err());
    }
}
