use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use sentinel_core::{
    models::{HeartbeatRequest, HeartbeatResponse},
    SentinelError, SentinelResult,
};
use tracing::{debug, info, warn};

use crate::{directory::AgentDirectory, mailbox::JobMailbox};

/// Tracks which session currently owns each agent.
///
/// A reconnecting agent can open a new stream before the old socket is noticed
/// as dead. Only the newest bound session may mark the agent offline.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    owners: Arc<DashMap<String, u64>>,
    next_token: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn bind(&self, agent_id: &str, token: u64) {
        self.owners.insert(agent_id.to_string(), token);
    }

    /// Drops ownership if `token` still holds it. Returns whether it did.
    fn release(&self, agent_id: &str, token: u64) -> bool {
        self.owners
            .remove_if(agent_id, |_, owner| *owner == token)
            .is_some()
    }
}

/// Server side of one agent's heartbeat stream.
///
/// The session binds to the first agent id it sees. Each request yields exactly
/// one response carrying at most one job. Ending the session leaves the mailbox
/// untouched, so an undelivered job waits for the agent's next session.
pub struct HeartbeatSession {
    directory: AgentDirectory,
    mailbox: JobMailbox,
    sessions: SessionRegistry,
    token: u64,
    agent_id: Option<String>,
    jobs_delivered: u64,
}

impl HeartbeatSession {
    pub fn new(directory: AgentDirectory, mailbox: JobMailbox, sessions: SessionRegistry) -> Self {
        let token = sessions.issue_token();
        Self {
            directory,
            mailbox,
            sessions,
            token,
            agent_id: None,
            jobs_delivered: 0,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn jobs_delivered(&self) -> u64 {
        self.jobs_delivered
    }

    pub async fn handle(&mut self, request: HeartbeatRequest) -> SentinelResult<HeartbeatResponse> {
        match &self.agent_id {
            Some(bound) if bound != &request.agent_id => {
                return Err(SentinelError::Protocol(format!(
                    "heartbeat for {} on a session bound to {}",
                    request.agent_id, bound
                )));
            }
            Some(_) => {}
            None => {
                info!(agent_id = %request.agent_id, "Heartbeat session started");
                self.sessions.bind(&request.agent_id, self.token);
                self.agent_id = Some(request.agent_id.clone());
            }
        }

        match self.directory.record_heartbeat(&request.agent_id).await {
            Ok(true) => {}
            Ok(false) => warn!(agent_id = %request.agent_id, "Heartbeat from unregistered agent"),
            Err(e) => warn!(agent_id = %request.agent_id, error = %e, "Failed to refresh last_seen"),
        }

        debug!(
            agent_id = %request.agent_id,
            running_jobs = request.running_jobs,
            cpu_usage = ?request.cpu_usage,
            "Heartbeat received"
        );

        let Some(mut job) = self.mailbox.take_if_present(&request.agent_id) else {
            return Ok(HeartbeatResponse::ack());
        };

        job.mark_dispatched();
        self.jobs_delivered += 1;
        metrics::counter!("sentinel_jobs_dispatched_total").increment(1);
        info!(
            agent_id = %request.agent_id,
            job_id = %job.job_id,
            kind = %job.kind,
            "Job dispatched"
        );

        Ok(HeartbeatResponse::with_job(job.envelope()))
    }

    /// Called once the stream has ended or failed.
    pub async fn close(self) {
        let Some(agent_id) = self.agent_id else {
            return;
        };

        if !self.sessions.release(&agent_id, self.token) {
            info!(
                agent_id = %agent_id,
                jobs_delivered = self.jobs_delivered,
                "Superseded heartbeat session ended"
            );
            return;
        }

        if let Err(e) = self.directory.mark_offline(&agent_id).await {
            warn!(agent_id = %agent_id, error = %e, "Failed to mark agent offline");
        }
        info!(
            agent_id = %agent_id,
            jobs_delivered = self.jobs_delivered,
            "Heartbeat session ended"
        );
    }
}
