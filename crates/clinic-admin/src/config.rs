//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、可选的TOML文件、`CLINIC__` 前缀的环境变量。

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CLINIC";

/// 未指定配置文件时尝试读取的默认文件
pub const DEFAULT_CONFIG_FILE: &str = "clinic.toml";

/// 诊所排队系统完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClinicConfig {
    /// 存储配置
    pub storage: StorageConfig,
    /// 排队配置
    pub queue: QueueConfig,
    /// 叫号播报配置
    pub announcement: AnnouncementConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 数据目录
    pub data_dir: PathBuf,
    /// 患者档案文件名
    pub patients_file: String,
    /// 就诊记录文件名
    pub visits_file: String,
    /// 日期标记文件名
    pub marker_file: String,
}

impl StorageConfig {
    pub fn patients_path(&self) -> PathBuf {
        self.data_dir.join(&self.patients_file)
    }

    pub fn visits_path(&self) -> PathBuf {
        self.data_dir.join(&self.visits_file)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.data_dir.join(&self.marker_file)
    }
}

/// 排队配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 主循环每次迭代都检查日期切换
    pub check_rollover_each_loop: bool,
    /// 挂号时未填写科室使用的默认值
    pub default_department: String,
    /// 叫号播报中的就诊地点
    pub service_point: String,
}

/// 叫号播报配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    pub enabled: bool,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤表达式
    pub level: String,
    /// 输出格式：full | compact
    pub format: String,
    /// 彩色输出
    pub ansi: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            patients_file: "patients.csv".to_string(),
            visits_file: "visits.csv".to_string(),
            marker_file: "last_cycle_date.json".to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            check_rollover_each_loop: true,
            default_department: "General".to_string(),
            service_point: "the examination room".to_string(),
        }
    }
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            ansi: true,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: ClinicConfig,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载并验证配置
    ///
    /// 显式指定的文件必须存在；未指定时尝试读取当前目录下的 `clinic.toml`。
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_config(config_path, None)?;
        Self::from_config(config, config_path.map(Path::to_path_buf))
    }

    /// 用给定配置创建管理器
    pub fn from_config(config: ClinicConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path,
            validator,
        })
    }

    fn load_config(
        config_path: Option<&Path>,
        env_source: Option<HashMap<String, String>>,
    ) -> Result<ClinicConfig> {
        let defaults = Config::try_from(&ClinicConfig::default())
            .context("Failed to build default configuration")?;

        let file = match config_path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_source),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: ClinicConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => debug!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 命令行覆盖：数据目录和日志级别
    pub fn apply_overrides(
        &mut self,
        data_dir: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Result<()> {
        let mut config = self.config.clone();
        if let Some(data_dir) = data_dir {
            config.storage.data_dir = data_dir;
        }
        if let Some(level) = log_level {
            config.logging.level = level;
        }

        self.validator.validate(&config)?;
        self.config = config;
        Ok(())
    }

    /// 以TOML格式保存当前配置
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str =
            toml::to_string_pretty(&self.config).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, config_str).context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&ClinicConfig) -> Result<()>,
    error_message: &'static str,
}

fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(anyhow::anyhow!("{} cannot be empty", field))
    } else {
        Ok(())
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "storage.data_dir",
                validator: |config| {
                    if config.storage.data_dir.as_os_str().is_empty() {
                        Err(anyhow::anyhow!("Data directory cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid data directory",
            },
            ValidationRule {
                field_path: "storage.*_file",
                validator: |config| {
                    let storage = &config.storage;
                    require_non_empty(&storage.patients_file, "patients_file")?;
                    require_non_empty(&storage.visits_file, "visits_file")?;
                    require_non_empty(&storage.marker_file, "marker_file")?;
                    if storage.patients_file == storage.visits_file
                        || storage.patients_file == storage.marker_file
                        || storage.visits_file == storage.marker_file
                    {
                        return Err(anyhow::anyhow!("Storage files must be distinct"));
                    }
                    Ok(())
                },
                error_message: "Invalid storage file names",
            },
            ValidationRule {
                field_path: "queue.default_department",
                validator: |config| {
                    require_non_empty(&config.queue.default_department, "default_department")
                },
                error_message: "Invalid default department",
            },
            ValidationRule {
                field_path: "queue.service_point",
                validator: |config| require_non_empty(&config.queue.service_point, "service_point"),
                error_message: "Invalid service point",
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| match config.logging.format.as_str() {
                    "full" | "compact" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
                },
                error_message: "Invalid log format",
            },
            ValidationRule {
                field_path: "logging.level",
                validator: |config| {
                    EnvFilter::try_new(&config.logging.level)
                        .map(|_| ())
                        .map_err(|e| anyhow::anyhow!("Unparsable log level: {}", e))
                },
                error_message: "Invalid log level",
            },
        ];

        Self { validation_rules }
    }

    pub fn validate(&self, config: &ClinicConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
