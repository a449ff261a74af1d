use std::fmt::Write;

use chrono::{DateTime, TimeZone};

use crate::app::error::AppError;
use crate::app::models::{ExportFormat, LogMode, LogRecord};

const KERNEL_CSV_HEADER: [&str; 3] = ["LEVEL", "TIME", "MSG"];
const LOGCAT_CSV_HEADER: [&str; 5] = ["TIME", "LEVEL", "TAG", "PID", "MSG"];
const UNKNOWN_PID: &str = "?";

const HTML_PREFIX: &str = "\
<!doctype html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\" />\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n";

const HTML_STYLE: &str = "\
<style>\n\
body{\n\
  margin: 0;\n\
  font-family: ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, \"Liberation Mono\", \"Courier New\", monospace;\n\
  font-size: 12px;\n\
  color: #0f172a;\n\
  background: #f7f7fb;\n\
  padding: 10px;\n\
}\n\
table { border-collapse: collapse; width: 100%; }\n\
td, th { border: 1px solid #d3d7e0; padding: 2px 6px; vertical-align: top; text-align: left; }\n\
tr.title th { background: #1d4ed8; color: #ffffff; }\n\
td.msg { white-space: pre-wrap; }\n\
</style>\n\
</head>\n\
<body>\n";

const HTML_SUFFIX: &str = "</table>\n</body>\n</html>\n";

/// Renders `records` in `format`. Every payload line becomes exactly one
/// output line, CSV row or table row, in source order.
pub fn render(
    records: &[LogRecord],
    mode: LogMode,
    format: ExportFormat,
    trace_id: &str,
) -> Result<String, AppError> {
    match format {
        ExportFormat::Text => Ok(render_text(records, mode)),
        ExportFormat::Csv => render_csv(records, mode, trace_id),
        ExportFormat::Html => Ok(render_html(records, mode)),
    }
}

pub fn render_text(records: &[LogRecord], mode: LogMode) -> String {
    let mut output = String::new();
    for record in records {
        let prefix = text_prefix(record, mode);
        for line in record.lines() {
            output.push_str(&prefix);
            output.push_str(": ");
            output.push_str(line);
            output.push('\n');
        }
    }
    output
}

fn text_prefix(record: &LogRecord, mode: LogMode) -> String {
    match mode {
        LogMode::Kernel => match record.time() {
            Some(time) => format!("<{}> [{}] ", record.level(), time),
            None => format!("<{}> ", record.level()),
        },
        LogMode::Logcat => format!(
            "{} {}/{}({})",
            record.time().unwrap_or_default(),
            record.level(),
            record.tag().unwrap_or_default(),
            pid_text(record)
        ),
    }
}

fn pid_text(record: &LogRecord) -> String {
    record
        .pid()
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| UNKNOWN_PID.to_string())
}

/// Metadata columns for one record, without the message column.
fn metadata_fields(record: &LogRecord, mode: LogMode) -> Vec<String> {
    let time = record.time().unwrap_or_default().to_string();
    match mode {
        LogMode::Kernel => vec![record.level().to_string(), time],
        LogMode::Logcat => vec![
            time,
            record.level().to_string(),
            record.tag().unwrap_or_default().to_string(),
            record.pid().map(|pid| pid.to_string()).unwrap_or_default(),
        ],
    }
}

fn header(mode: LogMode) -> &'static [&'static str] {
    match mode {
        LogMode::Kernel => &KERNEL_CSV_HEADER,
        LogMode::Logcat => &LOGCAT_CSV_HEADER,
    }
}

pub fn render_csv(records: &[LogRecord], mode: LogMode, trace_id: &str) -> Result<String, AppError> {
    let bytes = write_csv(Vec::new(), records, mode, trace_id)?;
    String::from_utf8(bytes)
        .map_err(|err| AppError::system(format!("CSV output is not UTF-8: {err}"), trace_id))
}

/// Streams the CSV document into `sink` and hands it back once flushed.
pub fn write_csv<W: std::io::Write>(
    sink: W,
    records: &[LogRecord],
    mode: LogMode,
    trace_id: &str,
) -> Result<W, AppError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(header(mode)).map_err(|err| {
        AppError::system(format!("Failed to write CSV header: {err}"), trace_id)
    })?;

    for record in records {
        let metadata = metadata_fields(record, mode);
        for line in record.lines() {
            let row = metadata.iter().map(String::as_str).chain(std::iter::once(line));
            writer.write_record(row).map_err(|err| {
                AppError::system(format!("Failed to write CSV row: {err}"), trace_id)
            })?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| AppError::system(format!("Failed to flush CSV: {err}"), trace_id))
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\n' => escaped.push_str("<br>"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn html_title(mode: LogMode) -> &'static str {
    match mode {
        LogMode::Kernel => "Kernel log (dmesg)",
        LogMode::Logcat => "Android log (logcat)",
    }
}

pub fn render_html(records: &[LogRecord], mode: LogMode) -> String {
    let mut output = String::with_capacity(HTML_PREFIX.len() + HTML_STYLE.len() + records.len() * 96);
    output.push_str(HTML_PREFIX);
    let _ = writeln!(output, "<title>{}</title>", html_title(mode));
    output.push_str(HTML_STYLE);
    output.push_str("<table>\n<tr class=\"title\">");
    for column in header(mode) {
        let _ = write!(output, "<th>{column}</th>");
    }
    output.push_str("</tr>\n");

    for record in records {
        let cells: Vec<String> = metadata_fields(record, mode)
            .iter()
            .map(|field| format!("<td>{}</td>", escape_html(field)))
            .collect();
        let cells = cells.concat();
        for line in record.lines() {
            let _ = writeln!(
                output,
                "<tr class=\"level-{}\">{}<td class=\"msg\">{}</td></tr>",
                escape_html(&record.level().to_string()),
                cells,
                escape_html(line)
            );
        }
    }

    output.push_str(HTML_SUFFIX);
    output
}

/// `dmesg_20261017_120000.html`-style name for an export written at `now`.
pub fn export_file_name<Tz: TimeZone>(mode: LogMode, format: ExportFormat, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stem = match mode {
        LogMode::Kernel => "dmesg",
        LogMode::Logcat => "logcat",
    };
    format!("{}_{}.{}", stem, now.format("%Y%m%d_%H%M%S"), format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn kernel_records() -> Vec<LogRecord> {
        let mut merged = LogRecord::kernel('3', Some("12.345".to_string()), "USB disconnect, device number 4");
        merged.absorb(LogRecord::kernel(
            '3',
            Some("12.345".to_string()),
            "usb 1-1: USB disconnect, device number 4",
        ));
        vec![
            merged,
            LogRecord::kernel('6', Some("12.346".to_string()), "wlan0: link becomes ready"),
            LogRecord::kernel('6', None, "garbage"),
        ]
    }

    fn logcat_records() -> Vec<LogRecord> {
        let mut merged = LogRecord::logcat('E', "AndroidRuntime", Some(812), "08-24 14:22:33.123", "FATAL EXCEPTION: main");
        merged.absorb(LogRecord::logcat(
            'E',
            "AndroidRuntime",
            Some(812),
            "08-24 14:22:33.123",
            "java.lang.NullPointerException",
        ));
        vec![
            merged,
            LogRecord::logcat('W', "Vendor", None, "08-24 14:22:34.000", "pid was unreadable"),
        ]
    }

    fn payload_lines(records: &[LogRecord]) -> usize {
        records.iter().map(LogRecord::line_count).sum()
    }

    #[test]
    fn kernel_text_repeats_prefix_for_merged_lines() {
        let text = render_text(&kernel_records(), LogMode::Kernel);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "<3> [12.345] : USB disconnect, device number 4",
                "<3> [12.345] : usb 1-1: USB disconnect, device number 4",
                "<6> [12.346] : wlan0: link becomes ready",
                "<6> : garbage",
            ]
        );
    }

    #[test]
    fn logcat_text_uses_time_level_tag_pid_prefix() {
        let text = render_text(&logcat_records(), LogMode::Logcat);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "08-24 14:22:33.123 E/AndroidRuntime(812): FATAL EXCEPTION: main");
        assert_eq!(
            lines[1],
            "08-24 14:22:33.123 E/AndroidRuntime(812): java.lang.NullPointerException"
        );
        assert_eq!(lines[2], "08-24 14:22:34.000 W/Vendor(?): pid was unreadable");
    }

    #[test]
    fn csv_headers_match_mode() {
        let kernel = render_csv(&[], LogMode::Kernel, "trace-csv").unwrap();
        assert_eq!(kernel.lines().next(), Some("LEVEL,TIME,MSG"));
        let logcat = render_csv(&[], LogMode::Logcat, "trace-csv").unwrap();
        assert_eq!(logcat.lines().next(), Some("TIME,LEVEL,TAG,PID,MSG"));
    }

    #[test]
    fn csv_round_trips_awkward_messages() {
        let awkward = "a, \"quoted\" value\nwith a newline";
        let records = vec![
            LogRecord::kernel('4', Some("1.5".to_string()), awkward),
            LogRecord::kernel('4', Some("1.6".to_string()), "plain"),
        ];
        let output = render_csv(&records, LogMode::Kernel, "trace-csv").unwrap();

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(headers, vec!["LEVEL", "TIME", "MSG"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "4");
        assert_eq!(&rows[0][1], "1.5");
        assert_eq!(&rows[0][2], awkward);
        assert_eq!(&rows[1][2], "plain");
    }

    struct BrokenSink;

    impl std::io::Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn csv_write_failure_carries_trace_id() {
        let records = vec![LogRecord::kernel('3', Some("1.0".to_string()), "boom")];
        let err = write_csv(BrokenSink, &records, LogMode::Kernel, "trace-broken")
            .err()
            .expect("expected error");
        assert_eq!(err.code, crate::app::error::ERR_SYSTEM);
        assert_eq!(err.trace_id, "trace-broken");
        assert!(err.error.contains("sink closed"), "unexpected message {}", err.error);
    }

    #[test]
    fn logcat_csv_leaves_unknown_pid_empty() {
        let output = render_csv(&logcat_records(), LogMode::Logcat, "trace-csv").unwrap();
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][3], "812");
        assert_eq!(&rows[1][4], "java.lang.NullPointerException");
        assert_eq!(&rows[2][3], "");
    }

    #[test]
    fn every_format_emits_one_unit_per_payload_line() {
        for (records, mode) in [
            (kernel_records(), LogMode::Kernel),
            (logcat_records(), LogMode::Logcat),
        ] {
            let expected = payload_lines(&records);

            let text = render(&records, mode, ExportFormat::Text, "trace-count").unwrap();
            assert_eq!(text.lines().count(), expected);

            let csv_output = render(&records, mode, ExportFormat::Csv, "trace-count").unwrap();
            let mut reader = csv::Reader::from_reader(csv_output.as_bytes());
            assert_eq!(reader.records().count(), expected);

            let html = render(&records, mode, ExportFormat::Html, "trace-count").unwrap();
            assert_eq!(html.matches("<tr class=\"level-").count(), expected);
            assert_eq!(html.matches("<tr class=\"title\">").count(), 1);
        }
    }

    #[test]
    fn html_escapes_markup_and_newlines() {
        let records = vec![LogRecord::logcat(
            'I',
            "<Tag>",
            Some(1),
            "01-01 00:00:00.000",
            "a & b 'c' \"d\"\nnext",
        )];
        let html = render_html(&records, LogMode::Logcat);
        assert!(html.contains("<td>&lt;Tag&gt;</td>"));
        assert!(html.contains("a &amp; b &#39;c&#39; &quot;d&quot;<br>next"));
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn export_file_name_uses_mode_stem_and_extension() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 5).unwrap();
        assert_eq!(
            export_file_name(LogMode::Kernel, ExportFormat::Html, &now),
            "dmesg_20261017_083005.html"
        );
        assert_eq!(
            export_file_name(LogMode::Logcat, ExportFormat::Csv, &now),
            "logcat_20261017_083005.csv"
        );
    }
}
