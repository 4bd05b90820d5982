pub mod bootstrap;
pub mod database;
pub mod in_memory_queue;
pub mod message_queue;

pub use bootstrap::connect_with_retry;
pub use database::*;
pub use in_memory_queue::InMemoryTaskQueue;
pub use message_queue::RabbitMQTaskQueue;
