use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use devlog_viewer_lib::app::commands::{
    export_logs, get_config, render_logs, reset_config, resolve_trace_id,
};
use devlog_viewer_lib::app::config::{load_config, AppConfig};
use devlog_viewer_lib::app::error::AppError;
use devlog_viewer_lib::app::logging::init_logging;
use devlog_viewer_lib::app::logview::session::LogViewSession;
use devlog_viewer_lib::app::models::{
    CollectRequest, ExportFormat, KernelLevel, LogBuffer, LogMode, LogcatLevel,
};
use devlog_viewer_lib::app::state::ViewState;

#[derive(Parser, Debug)]
#[command(
    name = "devlog",
    version,
    about = "Collect, merge and export kernel and logcat logs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump a log source once and print or export the merged records
    Collect(CollectArgs),

    /// Inspect or reset the stored configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(clap::Args, Debug)]
struct CollectArgs {
    /// kernel (dmesg) or logcat
    #[arg(long)]
    mode: Option<LogMode>,

    /// Most verbose kernel level to keep (0-7 or a name such as "err")
    #[arg(long)]
    level: Option<KernelLevel>,

    /// Minimum logcat priority (V, D, I, W, E, F)
    #[arg(long)]
    logcat_level: Option<LogcatLevel>,

    #[arg(long)]
    buffer: Option<LogBuffer>,

    /// Case-insensitive tag substring
    #[arg(long)]
    tag: Option<String>,

    #[arg(long)]
    pid: Option<i32>,

    /// text, html or csv
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Write an export file into this directory instead of printing
    #[arg(long)]
    output: Option<String>,

    /// Skip the `su -c` attempt
    #[arg(long)]
    no_root: bool,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Print the effective configuration as JSON
    Show,
    /// Restore defaults (the previous file is kept as a backup)
    Reset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let trace_id = match &cli.command {
        Command::Collect(args) => resolve_trace_id(args.trace_id.clone()),
        Command::Config { .. } => resolve_trace_id(None),
    };

    let config = match load_config(&trace_id) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            AppConfig::default()
        }
    };
    init_logging(&config.logging);

    let outcome = match cli.command {
        Command::Collect(args) => run_collect(args, config, trace_id),
        Command::Config { cmd } => run_config(cmd, trace_id),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!(trace_id = %err.trace_id, code = %err.code, error = %err.error, "devlog failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn build_request(args: &CollectArgs, config: &AppConfig) -> CollectRequest {
    let mut filters = config.defaults.filters.clone();
    if let Some(level) = args.level {
        filters.kernel_level = level;
    }
    if let Some(level) = args.logcat_level {
        filters.logcat_level = level;
    }
    if let Some(buffer) = args.buffer {
        filters.buffer = buffer;
    }
    if args.tag.is_some() {
        filters.tag = args.tag.clone();
    }
    if args.pid.is_some() {
        filters.pid = args.pid;
    }
    CollectRequest {
        mode: args.mode.unwrap_or(config.defaults.mode),
        filters,
    }
}

fn run_collect(args: CollectArgs, config: AppConfig, trace_id: String) -> Result<ExitCode, AppError> {
    let request = build_request(&args, &config);
    let mut settings = config.collector.clone();
    if args.no_root {
        settings.use_root = false;
    }
    if let Some(timeout) = args.timeout {
        if !(1..=600).contains(&timeout) {
            return Err(AppError::validation("timeout must be between 1 and 600 seconds", &trace_id));
        }
        settings.command_timeout_secs = timeout;
    }

    // Each attempt gets the full timeout; allow both plus some slack.
    let wait_for = Duration::from_secs(settings.command_timeout_secs * 2 + 5);
    let mode = request.mode;
    let mut session = LogViewSession::new(settings);
    session.start(request, &trace_id);

    let snapshot = match session.wait(wait_for).clone() {
        ViewState::Ready { snapshot } => snapshot,
        state @ ViewState::Empty { .. } => {
            eprintln!("{}", state.status_message());
            return Ok(ExitCode::SUCCESS);
        }
        ViewState::Failed { error } => return Err(error),
        ViewState::Loading { .. } | ViewState::Idle => {
            session.abort();
            return Err(AppError::dependency(
                format!("{mode} collection did not finish in time"),
                &trace_id,
            ));
        }
    };
    info!(
        trace_id = %trace_id,
        records = snapshot.summary.total_records,
        lines = snapshot.summary.payload_lines,
        "collection ready"
    );

    match args.output {
        Some(dir) => {
            let response = export_logs(snapshot.records, mode, args.format, Some(dir), Some(trace_id))?;
            println!("{}", response.data.output_path);
        }
        None => {
            let format = args.format.unwrap_or(config.export.default_format);
            let response = render_logs(snapshot.records, mode, format, Some(trace_id))?;
            print!("{}", response.data);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_config(cmd: ConfigCmd, trace_id: String) -> Result<ExitCode, AppError> {
    let response = match cmd {
        ConfigCmd::Show => get_config(Some(trace_id))?,
        ConfigCmd::Reset => reset_config(Some(trace_id))?,
    };
    let payload = serde_json::to_string_pretty(&response.data).map_err(|err| {
        AppError::system(format!("Failed to serialize config: {err}"), &response.trace_id)
    })?;
    println!("{payload}");
    Ok(ExitCode::SUCCESS)
}
