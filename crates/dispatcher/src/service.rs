use sentinel_core::{
    models::{Job, JobKind},
    SentinelResult,
};

use crate::{
    directory::AgentDirectory,
    heartbeat::{HeartbeatSession, SessionRegistry},
    mailbox::JobMailbox,
    report_sink::JobReportSink,
};

/// Shared coordinator state handed to every connection.
#[derive(Clone)]
pub struct CoordinationService {
    pub directory: AgentDirectory,
    pub mailbox: JobMailbox,
    pub reports: JobReportSink,
    pub sessions: SessionRegistry,
}

impl CoordinationService {
    pub fn new(directory: AgentDirectory, mailbox: JobMailbox, reports: JobReportSink) -> Self {
        Self {
            directory,
            mailbox,
            reports,
            sessions: SessionRegistry::new(),
        }
    }

    /// Offer a new job to an agent's mailbox. The agent does not have to be connected.
    pub fn dispatch(&self, target_agent: &str, kind: JobKind, payload: &str) -> Job {
        let job = Job::new(target_agent, kind, payload);
        self.mailbox.offer(job.clone());
        job
    }

    pub async fn register(&self, hostname: &str, address: &str) -> SentinelResult<String> {
        self.directory.register(hostname, address).await
    }

    pub fn open_session(&self) -> HeartbeatSession {
        HeartbeatSession::new(
            self.directory.clone(),
            self.mailbox.clone(),
            self.sessions.clone(),
        )
    }
}
