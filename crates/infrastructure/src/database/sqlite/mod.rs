pub mod sqlite_agent_repository;
pub mod sqlite_job_record_repository;
pub mod sqlite_task_repository;

pub use sqlite_agent_repository::SqliteAgentRepository;
pub use sqlite_job_record_repository::SqliteJobRecordRepository;
pub use sqlite_task_repository::SqliteTaskRepository;

use sentinel_core::SentinelError;

/// Parse a status column stored as text.
pub(crate) fn parse_status<T>(raw: &str) -> Result<T, SentinelError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(SentinelError::DatabaseOperation)
}
