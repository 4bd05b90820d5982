//! # 数据模型
//!
//! 协调平面与扫描队列共用的数据结构：Agent、Job、JobRecord、Task，
//! 以及协调接口上传输的消息体。
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举，
//! 持久化时以文本形式写入（见各枚举的 `as_str` / `FromStr`）。

pub mod agent;
pub mod job;
pub mod message;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use job::{Job, JobKind, JobRecord, JobStatus, ReportStatus};
pub use message::*;
pub use task::{Task, TaskStatus};
