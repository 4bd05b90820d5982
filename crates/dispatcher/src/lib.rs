//! Coordinator side of the fleet: agent directory, per-agent job mailbox,
//! heartbeat sessions, job report sink and scan task submission.

pub mod directory;
pub mod heartbeat;
pub mod mailbox;
pub mod report_sink;
pub mod service;
pub mod submission;

pub use directory::AgentDirectory;
pub use heartbeat::{HeartbeatSession, SessionRegistry};
pub use mailbox::JobMailbox;
pub use report_sink::JobReportSink;
pub use service::CoordinationService;
pub use submission::TaskSubmission;
