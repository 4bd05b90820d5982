pub mod config;
pub mod errors;
pub mod executor_registry;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use executor_registry::ExecutorRegistry;
pub use traits::*;
