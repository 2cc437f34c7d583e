//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML配置文件 → 环境变量覆盖（前缀 `COORDINATOR`，
//! 层级分隔符 `__`，例如 `COORDINATOR__DATABASE__URL`）。
//!
//! ```rust,no_run
//! use coordinator_core::config::AppConfig;
//!
//! let config = AppConfig::load(Some("config/coordinator.toml"))?;
//! println!("监听地址: {}", config.api.bind_address);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod models;

pub use models::*;
