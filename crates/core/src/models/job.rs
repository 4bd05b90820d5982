use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::message::JobEnvelope;

/// 作业类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// `sh -c <payload>` on the agent host.
    #[default]
    Shell,
    /// TCP port probe of the host named in the payload.
    Probe,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Shell => "shell",
            JobKind::Probe => "probe",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a job as reported by the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    Failed,
}

impl ReportStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            ReportStatus::Success
        } else {
            ReportStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "Success",
            ReportStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(ReportStatus::Success),
            "Failed" => Ok(ReportStatus::Failed),
            _ => Err(format!("Invalid report status: {s}")),
        }
    }
}

/// 作业状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Dispatched,
    Executing,
    Reported(ReportStatus),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Reported(_))
    }
}

/// A unit of work addressed to a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub target_agent_id: String,
    pub kind: JobKind,
    pub payload: String,
    pub status: JobStatus,
}

impl Job {
    pub fn new(target_agent_id: impl Into<String>, kind: JobKind, payload: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            target_agent_id: target_agent_id.into(),
            kind,
            payload: payload.into(),
            status: JobStatus::Queued,
        }
    }

    /// Rebuilds the agent-side view of a job received over the heartbeat channel.
    pub fn from_envelope(agent_id: impl Into<String>, envelope: JobEnvelope) -> Self {
        Self {
            job_id: envelope.job_id,
            target_agent_id: agent_id.into(),
            kind: envelope.kind,
            payload: envelope.payload,
            status: JobStatus::Dispatched,
        }
    }

    pub fn envelope(&self) -> JobEnvelope {
        JobEnvelope {
            job_id: self.job_id.clone(),
            kind: self.kind,
            payload: self.payload.clone(),
        }
    }

    pub fn mark_dispatched(&mut self) {
        self.status = JobStatus::Dispatched;
    }

    pub fn mark_executing(&mut self) {
        self.status = JobStatus::Executing;
    }

    pub fn mark_reported(&mut self, status: ReportStatus) {
        self.status = JobStatus::Reported(status);
    }
}

/// Append-only audit entry for one terminal job report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub job_id: String,
    pub agent_id: String,
    pub status: ReportStatus,
    pub result: String,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new("agent-1", JobKind::Shell, "uptime");
        assert_eq!(job.status, JobStatus::Queued);

        job.mark_dispatched();
        assert_eq!(job.status, JobStatus::Dispatched);

        job.mark_executing();
        job.mark_reported(ReportStatus::Failed);
        assert!(job.status.is_terminal());
        assert_eq!(job.status, JobStatus::Reported(ReportStatus::Failed));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = Job::new("agent-1", JobKind::Shell, "ls");
        let b = Job::new("agent-1", JobKind::Shell, "ls");
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn test_envelope_preserves_identity() {
        let job = Job::new("agent-1", JobKind::Probe, "10.0.0.5");
        let received = Job::from_envelope("agent-1", job.envelope());
        assert_eq!(received.job_id, job.job_id);
        assert_eq!(received.kind, JobKind::Probe);
        assert_eq!(received.status, JobStatus::Dispatched);
    }

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(serde_json::to_string(&JobKind::Probe).unwrap(), "\"probe\"");
        assert_eq!(
            serde_json::to_string(&ReportStatus::Success).unwrap(),
            "\"Success\""
        );
    }
}
