use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;
use crate::app::models::{ExportFormat, LogFilters, LogMode};

const CONFIG_PATH_ENV: &str = "DEVLOG_VIEWER_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = ".devlog_viewer_config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorSettings {
    pub dmesg_command: String,
    pub logcat_command: String,
    pub su_command: String,
    /// Try `su -c` first and fall back to running the source directly.
    pub use_root: bool,
    pub command_timeout_secs: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            dmesg_command: "dmesg".to_string(),
            logcat_command: "logcat".to_string(),
            su_command: "su".to_string(),
            use_root: true,
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DefaultFilterSettings {
    #[serde(default)]
    pub mode: LogMode,
    #[serde(default)]
    pub filters: LogFilters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ExportSettings {
    pub output_path: String,
    pub default_format: ExportFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub defaults: DefaultFilterSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collector: CollectorSettings::default(),
            defaults: DefaultFilterSettings::default(),
            export: ExportSettings::default(),
            logging: LoggingSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    home_dir().join(CONFIG_FILE_NAME)
}

pub fn backup_config_path() -> PathBuf {
    config_path().with_extension("backup.json")
}

/// Directory exports land in when neither the caller nor the config names one.
pub fn default_export_dir() -> PathBuf {
    home_dir().join("devlog_exports")
}

pub fn load_config(trace_id: &str) -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path()).map_err(|err| err.with_trace_id(trace_id))
}

pub fn save_config(config: &AppConfig, trace_id: &str) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
        .map_err(|err| err.with_trace_id(trace_id))
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

pub fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = CollectorSettings::default();
    if config.collector.dmesg_command.trim().is_empty() {
        config.collector.dmesg_command = defaults.dmesg_command;
    }
    if config.collector.logcat_command.trim().is_empty() {
        config.collector.logcat_command = defaults.logcat_command;
    }
    if config.collector.su_command.trim().is_empty() {
        config.collector.su_command = defaults.su_command;
    }
    if !(1..=600).contains(&config.collector.command_timeout_secs) {
        config.collector.command_timeout_secs = defaults.command_timeout_secs;
    }
    if config.logging.log_level.trim().is_empty() {
        config.logging.log_level = LoggingSettings::default().log_level;
    }
    if config.version.trim().is_empty() {
        config.version = env!("CARGO_PKG_VERSION").to_string();
    }
    config
}
