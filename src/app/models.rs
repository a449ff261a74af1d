use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Kernel ring buffer, as dumped by `dmesg`.
    #[default]
    Kernel,
    /// Android application log, as dumped by `logcat -v time`.
    Logcat,
}

impl LogMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LogMode::Kernel => "kernel",
            LogMode::Logcat => "logcat",
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kernel" | "dmesg" => Ok(LogMode::Kernel),
            "logcat" | "app" | "android" => Ok(LogMode::Logcat),
            other => Err(format!("unknown log mode: {other}")),
        }
    }
}

/// Kernel severity threshold. `0` is the most severe, `7` the least.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct KernelLevel(u8);

impl KernelLevel {
    pub const EMERGENCY: KernelLevel = KernelLevel(0);
    pub const ERROR: KernelLevel = KernelLevel(3);
    pub const INFO: KernelLevel = KernelLevel(6);
    pub const DEBUG: KernelLevel = KernelLevel(7);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 7).then_some(KernelLevel(value))
    }

    pub fn from_char(ch: char) -> Option<Self> {
        ch.to_digit(10).and_then(|digit| Self::new(digit as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        (b'0' + self.0) as char
    }
}

impl Default for KernelLevel {
    fn default() -> Self {
        KernelLevel::DEBUG
    }
}

impl TryFrom<u8> for KernelLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        KernelLevel::new(value).ok_or_else(|| format!("kernel level out of range: {value}"))
    }
}

impl From<KernelLevel> for u8 {
    fn from(level: KernelLevel) -> Self {
        level.0
    }
}

impl fmt::Display for KernelLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KernelLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let level = match trimmed.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" => 0,
            "alert" => 1,
            "crit" | "critical" => 2,
            "err" | "error" => 3,
            "warn" | "warning" => 4,
            "notice" => 5,
            "info" => 6,
            "debug" => 7,
            _ => trimmed
                .parse::<u8>()
                .map_err(|_| format!("unknown kernel level: {trimmed}"))?,
        };
        KernelLevel::try_from(level)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogcatLevel {
    #[default]
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogcatLevel {
    pub fn as_char(self) -> char {
        match self {
            LogcatLevel::Verbose => 'V',
            LogcatLevel::Debug => 'D',
            LogcatLevel::Info => 'I',
            LogcatLevel::Warn => 'W',
            LogcatLevel::Error => 'E',
            LogcatLevel::Fatal => 'F',
        }
    }
}

impl fmt::Display for LogcatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for LogcatLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "V" | "VERBOSE" => Ok(LogcatLevel::Verbose),
            "D" | "DEBUG" => Ok(LogcatLevel::Debug),
            "I" | "INFO" => Ok(LogcatLevel::Info),
            "W" | "WARN" | "WARNING" => Ok(LogcatLevel::Warn),
            "E" | "ERROR" => Ok(LogcatLevel::Error),
            "F" | "A" | "FATAL" | "ASSERT" => Ok(LogcatLevel::Fatal),
            other => Err(format!("unknown logcat level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogBuffer {
    #[default]
    Main,
    System,
    Radio,
    Events,
    Crash,
    All,
}

impl LogBuffer {
    pub fn as_arg(self) -> &'static str {
        match self {
            LogBuffer::Main => "main",
            LogBuffer::System => "system",
            LogBuffer::Radio => "radio",
            LogBuffer::Events => "events",
            LogBuffer::Crash => "crash",
            LogBuffer::All => "all",
        }
    }
}

impl fmt::Display for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for LogBuffer {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(LogBuffer::Main),
            "system" => Ok(LogBuffer::System),
            "radio" => Ok(LogBuffer::Radio),
            "events" => Ok(LogBuffer::Events),
            "crash" => Ok(LogBuffer::Crash),
            "all" => Ok(LogBuffer::All),
            other => Err(format!("unknown log buffer: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogFilters {
    #[serde(default)]
    pub kernel_level: KernelLevel,
    #[serde(default)]
    pub logcat_level: LogcatLevel,
    #[serde(default)]
    pub buffer: LogBuffer,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub pid: Option<i32>,
}

impl LogFilters {
    /// Trimmed, lowercased tag filter; blank values count as unset.
    pub fn tag_filter(&self) -> Option<String> {
        self.tag
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    }

    /// `0` is the historical "no pid filter" value.
    pub fn pid_filter(&self) -> Option<i32> {
        self.pid.filter(|pid| *pid != 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CollectRequest {
    pub mode: LogMode,
    #[serde(default)]
    pub filters: LogFilters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LogPayload {
    Single(String),
    Merged(Vec<String>),
}

/// One logical log entry, possibly covering several merged source lines.
///
/// The key fields (`level`, `pid`, `tag`, `time`) are fixed at construction;
/// merging only ever appends to the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    level: char,
    tag: Option<String>,
    pid: Option<i32>,
    time: Option<String>,
    payload: LogPayload,
}

impl LogRecord {
    pub fn kernel(level: char, time: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            tag: None,
            pid: None,
            time,
            payload: LogPayload::Single(message.into()),
        }
    }

    pub fn logcat(
        level: char,
        tag: impl Into<String>,
        pid: Option<i32>,
        time: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            tag: Some(tag.into()),
            pid,
            time: Some(time.into()),
            payload: LogPayload::Single(message.into()),
        }
    }

    pub fn level(&self) -> char {
        self.level
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn payload(&self) -> &LogPayload {
        &self.payload
    }

    /// The single message, if this record was never merged.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            LogPayload::Single(message) => Some(message),
            LogPayload::Merged(_) => None,
        }
    }

    /// The merged message lines, if this record absorbed continuation lines.
    pub fn message_list(&self) -> Option<&[String]> {
        match &self.payload {
            LogPayload::Single(_) => None,
            LogPayload::Merged(lines) => Some(lines),
        }
    }

    /// Every payload line in arrival order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match &self.payload {
            LogPayload::Single(message) => std::slice::from_ref(message),
            LogPayload::Merged(lines) => lines,
        };
        slice.iter().map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        match &self.payload {
            LogPayload::Single(_) => 1,
            LogPayload::Merged(lines) => lines.len(),
        }
    }

    pub fn same_key(&self, other: &LogRecord) -> bool {
        self.level == other.level
            && self.pid == other.pid
            && self.tag == other.tag
            && self.time == other.time
    }

    /// Appends the payload of `other`, which must share this record's key.
    pub(crate) fn absorb(&mut self, other: LogRecord) {
        if let LogPayload::Single(message) = &mut self.payload {
            let first = std::mem::take(message);
            self.payload = LogPayload::Merged(vec![first]);
        }
        if let LogPayload::Merged(lines) = &mut self.payload {
            match other.payload {
                LogPayload::Single(message) => lines.push(message),
                LogPayload::Merged(more) => lines.extend(more),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Text,
    Html,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Text => "text",
            ExportFormat::Html => "html",
            ExportFormat::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" | "plain" => Ok(ExportFormat::Text),
            "html" | "htm" => Ok(ExportFormat::Html),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogSummary {
    pub total_records: usize,
    pub payload_lines: usize,
    pub levels: BTreeMap<String, usize>,
}

impl LogSummary {
    pub fn from_records(records: &[LogRecord]) -> Self {
        let mut summary = LogSummary::default();
        for record in records {
            summary.total_records += 1;
            summary.payload_lines += record.line_count();
            *summary
                .levels
                .entry(record.level().to_string())
                .or_insert(0) += 1;
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSnapshot {
    pub mode: LogMode,
    pub records: Vec<LogRecord>,
    pub summary: LogSummary,
}

impl LogSnapshot {
    pub fn new(mode: LogMode, records: Vec<LogRecord>) -> Self {
        let summary = LogSummary::from_records(&records);
        Self {
            mode,
            records,
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogExportResult {
    pub mode: LogMode,
    pub format: ExportFormat,
    pub output_path: String,
    pub record_count: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}
