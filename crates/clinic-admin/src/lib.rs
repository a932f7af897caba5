//! # 诊所管理模块
//!
//! 提供配置加载、验证、保存以及日志初始化等运维功能

pub mod config;
pub mod logging;

pub use config::{
    AnnouncementConfig, ClinicConfig, ConfigManager, ConfigValidator, LoggingConfig, QueueConfig,
    StorageConfig,
};
pub use logging::init_logging;
