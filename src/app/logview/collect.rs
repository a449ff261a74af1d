use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::config::CollectorSettings;
use crate::app::error::AppError;
use crate::app::logview::merge::RunMerger;
use crate::app::logview::parse::LineParser;
use crate::app::models::{CollectRequest, LogMode, LogRecord};
use crate::app::shell::locator::{resolve_program, shell_join};
use crate::app::shell::runner::{run_command_with_timeout, CommandOutput};

/// One way of starting the log source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub privileged: bool,
}

/// The unprivileged command line for `request`.
pub fn source_command(request: &CollectRequest, settings: &CollectorSettings) -> (String, Vec<String>) {
    match request.mode {
        // Only `--raw` output keeps the `<N>` priority prefix.
        LogMode::Kernel => (
            resolve_program(&settings.dmesg_command, "dmesg"),
            vec!["-r".to_string()],
        ),
        LogMode::Logcat => {
            let filters = &request.filters;
            let args = vec![
                "-d".to_string(),
                "-v".to_string(),
                "time".to_string(),
                "-b".to_string(),
                filters.buffer.as_arg().to_string(),
                format!("*:{}", filters.logcat_level.as_char()),
            ];
            (resolve_program(&settings.logcat_command, "logcat"), args)
        }
    }
}

/// Attempts in order: `su -c ...` when root is enabled, then the plain command.
pub fn invocations(request: &CollectRequest, settings: &CollectorSettings) -> Vec<SourceInvocation> {
    let (program, args) = source_command(request, settings);
    let mut attempts = Vec::with_capacity(2);
    if settings.use_root {
        attempts.push(SourceInvocation {
            program: resolve_program(&settings.su_command, "su"),
            args: vec!["-c".to_string(), shell_join(&program, &args)],
            privileged: true,
        });
    }
    attempts.push(SourceInvocation {
        program,
        args,
        privileged: false,
    });
    attempts
}

/// Parses every line and folds the results through a [`RunMerger`].
pub fn fold_lines<I, S>(lines: I, parser: &LineParser) -> Vec<LogRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut merger = RunMerger::new();
    for line in lines {
        if let Some(record) = parser.parse(line.as_ref()) {
            merger.push(record);
        }
    }
    merger.finish()
}

/// Decides whether a finished source produced a usable stream.
///
/// `su` frequently exits 0 after refusing access, so a privileged run with
/// nothing on stdout but complaints on stderr counts as a failure.
fn accept_output(output: CommandOutput, privileged: bool) -> Result<String, String> {
    let has_stdout = !output.stdout.trim().is_empty();
    if has_stdout {
        return Ok(output.stdout);
    }
    let stderr = output.stderr.trim();
    if output.succeeded() && !(privileged && !stderr.is_empty()) {
        return Ok(output.stdout);
    }
    let code = output
        .exit_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string());
    if stderr.is_empty() {
        Err(format!("exited with {code} and no output"))
    } else {
        Err(format!("exited with {code}: {stderr}"))
    }
}

/// Collects with an injected command runner.
///
/// `Ok` with an empty vector means the source ran but nothing matched;
/// `Err` means no attempt produced a stream at all.
pub fn collect_with<F>(
    request: &CollectRequest,
    settings: &CollectorSettings,
    trace_id: &str,
    mut run: F,
) -> Result<Vec<LogRecord>, AppError>
where
    F: FnMut(&SourceInvocation, Duration, &str) -> Result<CommandOutput, AppError>,
{
    let timeout = Duration::from_secs(settings.command_timeout_secs.max(1));
    let parser = LineParser::for_mode(request.mode, &request.filters);
    let mut failures: Vec<String> = Vec::new();

    for invocation in invocations(request, settings) {
        let path = if invocation.privileged { "privileged" } else { "direct" };
        let outcome = run(&invocation, timeout, trace_id)
            .map_err(|err| err.error)
            .and_then(|output| accept_output(output, invocation.privileged));

        match outcome {
            Ok(stdout) => {
                let records = fold_lines(stdout.lines(), &parser);
                info!(
                    trace_id = %trace_id,
                    mode = %request.mode,
                    path,
                    records = records.len(),
                    "log collection finished"
                );
                return Ok(records);
            }
            Err(reason) => {
                warn!(
                    trace_id = %trace_id,
                    program = %invocation.program,
                    path,
                    error = %reason,
                    "log source attempt failed"
                );
                failures.push(format!("{path} {}: {reason}", invocation.program));
            }
        }
    }

    debug!(trace_id = %trace_id, attempts = failures.len(), "all log source attempts failed");
    Err(AppError::dependency(
        format!("Log collection failed ({})", failures.join("; ")),
        trace_id,
    ))
}

pub fn collect_logs(
    request: &CollectRequest,
    settings: &CollectorSettings,
    trace_id: &str,
) -> Result<Vec<LogRecord>, AppError> {
    collect_with(request, settings, trace_id, |invocation, timeout, trace_id| {
        run_command_with_timeout(&invocation.program, &invocation.args, timeout, trace_id)
    })
}
