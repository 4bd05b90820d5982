pub mod message_queue;
pub mod repository;
pub mod task_executor;

pub use message_queue::*;
pub use repository::*;
pub use task_executor::*;
