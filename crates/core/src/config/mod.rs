//! 配置管理
//!
//! 按默认值、TOML配置文件、`SENTINEL_` 环境变量的顺序叠加加载，
//! 加载完成后对每个配置段执行校验。

pub mod models;

pub use models::*;
