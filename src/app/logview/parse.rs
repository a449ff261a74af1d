use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::app::models::{KernelLevel, LogFilters, LogMode, LogRecord};

const DEFAULT_KERNEL_LEVEL: char = '6';
const PID_FIELD_END: &str = "): ";

/// Turns one raw source line into at most one [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParser {
    Kernel {
        max_level: KernelLevel,
    },
    Logcat {
        /// Lowercased substring the tag must contain.
        tag: Option<String>,
        pid: Option<i32>,
    },
}

impl LineParser {
    pub fn for_mode(mode: LogMode, filters: &LogFilters) -> Self {
        match mode {
            LogMode::Kernel => LineParser::Kernel {
                max_level: filters.kernel_level,
            },
            LogMode::Logcat => LineParser::Logcat {
                tag: filters.tag_filter(),
                pid: filters.pid_filter(),
            },
        }
    }

    pub fn parse(&self, line: &str) -> Option<LogRecord> {
        match self {
            LineParser::Kernel { max_level } => parse_kernel_line(line, *max_level),
            LineParser::Logcat { tag, pid } => parse_logcat_line(line, tag.as_deref(), *pid),
        }
    }
}

fn kernel_time_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("kernel time regex should compile"))
}

/// Parses `<L>[ seconds.micros] message`. Lines without a `<L>` marker are
/// treated as level 6.
pub fn parse_kernel_line(line: &str, max_level: KernelLevel) -> Option<LogRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let (level, rest) = split_level_marker(line);
    let level_value = level.to_digit(10).unwrap_or(6);
    if level_value > u32::from(max_level.value()) {
        return None;
    }

    let (time, message) = split_kernel_time(rest);
    Some(LogRecord::kernel(level, time, message.trim()))
}

fn split_level_marker(line: &str) -> (char, &str) {
    let bytes = line.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'<' && bytes[1].is_ascii_digit() && bytes[2] == b'>' {
        (bytes[1] as char, &line[3..])
    } else {
        (DEFAULT_KERNEL_LEVEL, line)
    }
}

fn split_kernel_time(rest: &str) -> (Option<String>, &str) {
    let Some(after_open) = rest.strip_prefix('[') else {
        return (None, rest);
    };
    let Some(close) = after_open.find(']') else {
        debug!(line = %rest, "kernel line has an unterminated timestamp bracket");
        return (None, rest);
    };
    let candidate = after_open[..close].trim();
    if !kernel_time_regex().is_match(candidate) {
        debug!(timestamp = %candidate, "kernel timestamp is not numeric");
        return (None, rest);
    }
    (Some(candidate.to_string()), &after_open[close + 1..])
}

/// Parses `MM-DD HH:MM:SS.mmm L/TAG( PID): MESSAGE` as produced by
/// `logcat -v time`.
pub fn parse_logcat_line(line: &str, tag_filter: Option<&str>, pid_filter: Option<i32>) -> Option<LogRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with('-') || line.trim().is_empty() {
        return None;
    }

    let Some(anchors) = LogcatAnchors::locate(line) else {
        debug!(line = %line, "skipping malformed logcat line");
        return None;
    };

    let pid = parse_pid(&line[anchors.pid_open + 1..anchors.pid_end]);
    if let Some(wanted) = pid_filter.filter(|pid| *pid != 0) {
        if pid != Some(wanted) {
            return None;
        }
    }

    let tag = line[anchors.slash + 1..anchors.pid_open].trim_end();
    if let Some(wanted) = tag_filter {
        if !tag.to_lowercase().contains(&wanted.to_lowercase()) {
            return None;
        }
    }

    let level = line[..anchors.slash].chars().next_back()?;
    let time = &line[..anchors.time_end];
    let message = line[anchors.pid_end + PID_FIELD_END.len()..].trim();

    Some(LogRecord::logcat(level, tag, pid, time, message))
}

struct LogcatAnchors {
    time_end: usize,
    slash: usize,
    pid_open: usize,
    pid_end: usize,
}

impl LogcatAnchors {
    fn locate(line: &str) -> Option<Self> {
        let date_end = line.find(' ')?;
        let time_end = date_end + 1 + line[date_end + 1..].find(' ')?;
        let slash = time_end + line[time_end..].find('/')?;
        let pid_end = slash + line[slash..].find(PID_FIELD_END)?;
        let pid_open = slash + line[slash..pid_end].rfind('(')?;
        Some(Self {
            time_end,
            slash,
            pid_open,
            pid_end,
        })
    }
}

/// Some vendors print `uid*pid`; only the trailing component is the pid.
fn parse_pid(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let digits = match raw.rfind('*') {
        Some(index) => &raw[index + 1..],
        None => raw,
    };
    digits.trim().parse().ok()
}
