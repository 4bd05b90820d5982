pub mod agents;
pub mod health;
pub mod heartbeat;
pub mod jobs;
pub mod tasks;
