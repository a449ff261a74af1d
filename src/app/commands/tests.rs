use super::*;

use std::path::Path;

use tempfile::TempDir;

use crate::app::error::{ERR_DEPENDENCY, ERR_VALIDATION};
use crate::app::models::LogFilters;

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    LOCK.get_or_init(|| std::sync::Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ConfigPathGuard {
    previous: Option<String>,
}

impl ConfigPathGuard {
    fn point_at(path: &Path) -> Self {
        let previous = std::env::var("DEVLOG_VIEWER_CONFIG_PATH").ok();
        std::env::set_var("DEVLOG_VIEWER_CONFIG_PATH", path);
        Self { previous }
    }
}

impl Drop for ConfigPathGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => std::env::set_var("DEVLOG_VIEWER_CONFIG_PATH", value),
            None => std::env::remove_var("DEVLOG_VIEWER_CONFIG_PATH"),
        }
    }
}

fn sample_records() -> Vec<LogRecord> {
    let mut first = LogRecord::kernel('3', Some("12.345".to_string()), "USB disconnect");
    first.absorb(LogRecord::kernel('3', Some("12.345".to_string()), "usb 1-1: gone"));
    vec![
        first,
        LogRecord::kernel('6', Some("12.346".to_string()), "wlan0: link becomes ready"),
    ]
}

#[test]
fn resolve_trace_id_keeps_caller_value() {
    assert_eq!(resolve_trace_id(Some("trace-9".to_string())), "trace-9");
    let generated = resolve_trace_id(Some("  ".to_string()));
    assert!(Uuid::parse_str(&generated).is_ok());
    assert!(Uuid::parse_str(&resolve_trace_id(None)).is_ok());
}

#[test]
fn ensure_non_empty_reports_field() {
    let err = ensure_non_empty(" ", "output_dir", "trace-1").expect_err("expected error");
    assert_eq!(err.code, ERR_VALIDATION);
    assert_eq!(err.trace_id, "trace-1");
    assert!(err.error.contains("output_dir"));
}

#[test]
fn save_and_reset_config_round_trip() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("tmp");
    let _guard = ConfigPathGuard::point_at(&dir.path().join("config.json"));

    let mut config = AppConfig::default();
    config.collector.logcat_command = "  \"logcat\"  ".to_string();
    config.collector.command_timeout_secs = 0;
    config.export.output_path = " /tmp/devlog ".to_string();

    let saved = save_app_config(config, Some("trace-save".to_string())).expect("save");
    assert_eq!(saved.trace_id, "trace-save");
    assert_eq!(saved.data.collector.logcat_command, "logcat");
    assert_eq!(saved.data.collector.command_timeout_secs, 30);
    assert_eq!(saved.data.export.output_path, "/tmp/devlog");

    let loaded = get_config(None).expect("load");
    assert_eq!(loaded.data, saved.data);

    let reset = reset_config(None).expect("reset");
    assert_eq!(reset.data.export.output_path, "");
    assert!(dir.path().join("config.backup.json").exists());
}

#[test]
fn save_rejects_missing_explicit_command_path() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("tmp");
    let config_path = dir.path().join("config.json");
    let _guard = ConfigPathGuard::point_at(&config_path);

    let mut config = AppConfig::default();
    config.collector.su_command = "/no/such/dir/su".to_string();
    let err = save_app_config(config, Some("trace-bad".to_string())).expect_err("expected error");
    assert_eq!(err.code, ERR_VALIDATION);
    assert!(err.error.contains("collector.su_command"));
    assert!(!config_path.exists());
}

#[test]
fn collect_uses_configured_defaults_without_request() {
    let mut config = AppConfig::default();
    config.defaults.mode = LogMode::Logcat;
    config.defaults.filters = LogFilters {
        tag: Some("Wifi".to_string()),
        ..LogFilters::default()
    };

    let response = collect_logs_inner(None, &config, "trace-defaults", |request, _settings, _trace| {
        assert_eq!(request.mode, LogMode::Logcat);
        assert_eq!(request.filters.tag.as_deref(), Some("Wifi"));
        Ok(vec![LogRecord::logcat(
            'I',
            "WifiService",
            Some(100),
            "01-01 00:00:00.000",
            "connected",
        )])
    })
    .expect("collect");

    assert_eq!(response.trace_id, "trace-defaults");
    assert_eq!(response.data.mode, LogMode::Logcat);
    assert_eq!(response.data.summary.total_records, 1);
}

#[test]
fn collect_distinguishes_empty_from_failure() {
    let config = AppConfig::default();
    let empty = collect_logs_inner(None, &config, "trace-empty", |_request, _settings, _trace| {
        Ok(Vec::new())
    })
    .expect("empty is not an error");
    assert!(empty.data.records.is_empty());

    let err = collect_logs_inner(None, &config, "trace-fail", |_request, _settings, trace| {
        Err(AppError::dependency("dmesg exited with 1", trace))
    })
    .expect_err("failure must surface");
    assert_eq!(err.code, ERR_DEPENDENCY);
    assert_eq!(err.trace_id, "trace-fail");
}

#[test]
fn render_logs_returns_text() {
    let response = render_logs(
        sample_records(),
        LogMode::Kernel,
        ExportFormat::Text,
        Some("trace-render".to_string()),
    )
    .expect("render");
    assert_eq!(response.data.lines().count(), 3);
    assert!(response.data.starts_with("<3> [12.345] : USB disconnect"));
}

#[test]
fn export_logs_writes_into_explicit_dir() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("tmp");
    let _guard = ConfigPathGuard::point_at(&dir.path().join("config.json"));
    let out_dir = dir.path().join("nested").join("exports");

    let response = export_logs(
        sample_records(),
        LogMode::Kernel,
        Some(ExportFormat::Csv),
        Some(out_dir.to_string_lossy().to_string()),
        Some("trace-export".to_string()),
    )
    .expect("export");

    let result = response.data;
    assert_eq!(result.record_count, 2);
    assert_eq!(result.line_count, 3);
    assert_eq!(result.format, ExportFormat::Csv);
    let written = Path::new(&result.output_path);
    assert!(written.starts_with(&out_dir));
    let file_name = written.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("dmesg_"));
    assert!(file_name.ends_with(".csv"));

    let contents = fs::read_to_string(written).expect("read export");
    assert!(contents.starts_with("LEVEL,TIME,MSG"));
    assert_eq!(contents.lines().count(), 4);
}

#[test]
fn export_logs_falls_back_to_configured_dir_and_format() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("tmp");
    let _guard = ConfigPathGuard::point_at(&dir.path().join("config.json"));
    let configured = dir.path().join("configured");

    let mut config = AppConfig::default();
    config.export.output_path = configured.to_string_lossy().to_string();
    config.export.default_format = ExportFormat::Html;
    save_app_config(config, None).expect("save");

    let response = export_logs(sample_records(), LogMode::Kernel, None, Some(" ".to_string()), None)
        .expect("export");
    assert_eq!(response.data.format, ExportFormat::Html);
    assert!(Path::new(&response.data.output_path).starts_with(&configured));
    assert!(response.data.output_path.ends_with(".html"));
}
