use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::config::{
    default_export_dir, load_config, save_config, validate_config, AppConfig, CollectorSettings,
};
use crate::app::error::AppError;
use crate::app::logview::collect;
use crate::app::logview::export::{export_file_name, render};
use crate::app::models::{
    CollectRequest, CommandResponse, ExportFormat, LogExportResult, LogMode, LogRecord,
    LogSnapshot,
};
use crate::app::shell::locator::{normalize_command_path, validate_program};

#[cfg(test)]
mod tests;

pub fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(
            format!("{field} is required"),
            trace_id,
        ));
    }
    Ok(())
}

fn normalize_config_for_save(mut config: AppConfig) -> AppConfig {
    config.collector.dmesg_command = normalize_command_path(&config.collector.dmesg_command);
    config.collector.logcat_command = normalize_command_path(&config.collector.logcat_command);
    config.collector.su_command = normalize_command_path(&config.collector.su_command);
    config.export.output_path = config.export.output_path.trim().to_string();
    validate_config(config)
}

fn validate_collector_commands(
    settings: &CollectorSettings,
    trace_id: &str,
) -> Result<(), AppError> {
    for (field, program) in [
        ("collector.dmesg_command", &settings.dmesg_command),
        ("collector.logcat_command", &settings.logcat_command),
        ("collector.su_command", &settings.su_command),
    ] {
        validate_program(program)
            .map_err(|message| AppError::validation(format!("{field}: {message}"), trace_id))?;
    }
    Ok(())
}

pub fn get_config(trace_id: Option<String>) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: config,
    })
}

pub fn save_app_config(
    config: AppConfig,
    trace_id: Option<String>,
) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = normalize_config_for_save(config);
    validate_collector_commands(&config.collector, &trace_id)?;
    save_config(&config, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: config,
    })
}

pub fn reset_config(trace_id: Option<String>) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = normalize_config_for_save(AppConfig::default());
    save_config(&config, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: config,
    })
}

/// Runs one collection synchronously. A request of `None` uses the
/// configured default mode and filters.
pub fn collect_logs(
    request: Option<CollectRequest>,
    trace_id: Option<String>,
) -> Result<CommandResponse<LogSnapshot>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    collect_logs_inner(request, &config, &trace_id, collect::collect_logs)
}

fn collect_logs_inner<F>(
    request: Option<CollectRequest>,
    config: &AppConfig,
    trace_id: &str,
    collector: F,
) -> Result<CommandResponse<LogSnapshot>, AppError>
where
    F: FnOnce(&CollectRequest, &CollectorSettings, &str) -> Result<Vec<LogRecord>, AppError>,
{
    let request = request.unwrap_or_else(|| CollectRequest {
        mode: config.defaults.mode,
        filters: config.defaults.filters.clone(),
    });
    let records = collector(&request, &config.collector, trace_id)?;
    if records.is_empty() {
        warn!(trace_id = %trace_id, mode = %request.mode, "no log information available");
    }
    Ok(CommandResponse {
        trace_id: trace_id.to_string(),
        data: LogSnapshot::new(request.mode, records),
    })
}

pub fn render_logs(
    records: Vec<LogRecord>,
    mode: LogMode,
    format: ExportFormat,
    trace_id: Option<String>,
) -> Result<CommandResponse<String>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let rendered = render(&records, mode, format, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: rendered,
    })
}

/// Writes `records` under `output_dir`, the configured export path, or
/// [`default_export_dir`], in that order of preference.
pub fn export_logs(
    records: Vec<LogRecord>,
    mode: LogMode,
    format: Option<ExportFormat>,
    output_dir: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<LogExportResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    let format = format.unwrap_or(config.export.default_format);

    let resolved_dir = output_dir
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| {
            if !config.export.output_path.trim().is_empty() {
                config.export.output_path.clone()
            } else {
                default_export_dir().to_string_lossy().to_string()
            }
        });
    ensure_non_empty(&resolved_dir, "output_dir", &trace_id)?;

    fs::create_dir_all(&resolved_dir).map_err(|err| {
        AppError::system(format!("Failed to create output dir: {err}"), &trace_id)
    })?;

    let payload = render(&records, mode, format, &trace_id)?;
    let output_path = PathBuf::from(&resolved_dir).join(export_file_name(mode, format, &Utc::now()));
    fs::write(&output_path, payload).map_err(|err| {
        AppError::system(format!("Failed to write {mode} export: {err}"), &trace_id)
    })?;

    let line_count = records.iter().map(LogRecord::line_count).sum();
    info!(
        trace_id = %trace_id,
        path = %output_path.display(),
        format = %format,
        records = records.len(),
        "log export written"
    );

    Ok(CommandResponse {
        trace_id,
        data: LogExportResult {
            mode,
            format,
            output_path: output_path.to_string_lossy().to_string(),
            record_count: records.len(),
            line_count,
        },
    })
}
