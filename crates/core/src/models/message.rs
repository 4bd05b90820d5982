//! Wire messages of the coordination surface.

use serde::{Deserialize, Serialize};

use super::job::{JobKind, ReportStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub hostname: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub success: bool,
}

/// One liveness frame sent by an agent on its heartbeat stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    #[serde(default)]
    pub running_jobs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
}

/// Answer to exactly one [`HeartbeatRequest`]. Carries at most one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub job: Option<JobEnvelope>,
    pub config_outdated: bool,
}

impl HeartbeatResponse {
    pub fn ack() -> Self {
        Self {
            job: None,
            config_outdated: false,
        }
    }

    pub fn with_job(job: JobEnvelope) -> Self {
        Self {
            job: Some(job),
            config_outdated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: String,
    pub kind: JobKind,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJobRequest {
    pub agent_id: String,
    pub job_id: String,
    pub status: ReportStatus,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJobResponse {
    pub received: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJobRequest {
    pub target_agent: String,
    #[serde(default)]
    pub kind: JobKind,
    pub cmd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJobResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_request_defaults() {
        let req: HeartbeatRequest = serde_json::from_str(r#"{"agent_id":"a1"}"#).unwrap();
        assert_eq!(req.agent_id, "a1");
        assert_eq!(req.running_jobs, 0);
        assert!(req.cpu_usage.is_none());
    }

    #[test]
    fn test_empty_ack_serializes_null_job() {
        let json = serde_json::to_value(HeartbeatResponse::ack()).unwrap();
        assert!(json["job"].is_null());
        assert_eq!(json["config_outdated"], false);
    }

    #[test]
    fn test_dispatch_request_defaults_to_shell() {
        let req: DispatchJobRequest =
            serde_json::from_str(r#"{"target_agent":"a1","cmd":"whoami"}"#).unwrap();
        assert_eq!(req.kind, JobKind::Shell);
    }
}
