//! 日志初始化
//!
//! 日志写到 stderr，避免与 stdout 上的操作菜单交错。

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// 根据配置构建过滤器；`RUST_LOG` 存在时优先
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level)),
    }
}

/// 初始化全局日志订阅器，只能调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let result = match config.format.as_str() {
        "full" => builder.try_init(),
        _ => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    tracing::debug!("Logging initialised at level {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let mut config = LoggingConfig::default();
        assert!(build_filter(&config).is_ok());

        config.level = "clinic_workflow=debug,warn".to_string();
        assert!(build_filter(&config).is_ok());

        config.level = "clinic=loud".to_string();
        assert!(build_filter(&config).is_err());
    }
}
