//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use asset_collector::collector::AssetCollector;
use asset_collector::collector::record::RecordReport;
use asset_collector::collector::run::TrainingRun;
use asset_collector::core::config::Config;
use asset_collector::core::errors::AcError;
use asset_collector::watch::poller::{AssetPoller, PollOutcome, RunOutcome};
use asset_collector::watch::signals::ShutdownSignal;

/// Asset Collector: keeps per-iteration training images in sync with their sidecar.
#[derive(Debug, Parser)]
#[command(
    name = "acol",
    author,
    version,
    about = "Asset Collector - incremental image collection for training runs",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Collect a run directory once and print its records.
    Collect(CollectArgs),
    /// Re-collect run directories on an interval until interrupted.
    Watch(WatchArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version information.
    Version,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct CollectArgs {
    /// Run output directory containing the sidecar file.
    #[arg(value_name = "DIR")]
    dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct WatchArgs {
    /// Run output directories to track.
    #[arg(value_name = "DIR", required = true)]
    dirs: Vec<PathBuf>,
    /// Poll interval in milliseconds (defaults to watch.poll_interval_ms).
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
    /// Stop after this many cycles.
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Collection or environment failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<AcError> for CliError {
    fn from(value: AcError) -> Self {
        match value {
            AcError::InvalidConfig { .. }
            | AcError::MissingConfig { .. }
            | AcError::ConfigParse { .. } => Self::User(value.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Collect(args) => run_collect(cli, args),
        Command::Watch(args) => run_watch(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version => emit_version(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_collect(cli: &Cli, args: &CollectArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let collector = AssetCollector::from_config(&config.collector);
    let collection = collector.collect_with_stats(&args.dir, &[])?;
    let reports = collection
        .records
        .iter()
        .map(|record| record.report())
        .collect::<Result<Vec<_>, _>>()?;

    match output_mode(cli) {
        OutputMode::Human => {
            if !collection.stats.metadata_present {
                println!(
                    "{}: no {} file, nothing to collect",
                    args.dir.display(),
                    collector.sidecar_name()
                );
                return Ok(());
            }
            println!(
                "{}: {} records, {} bytes read",
                args.dir.display().to_string().bold(),
                collection.stats.entries,
                collection.stats.content_bytes_read
            );
            for (position, report) in reports.iter().enumerate() {
                print_record_human(position, report);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "collect",
                "path": args.dir.to_string_lossy(),
                "stats": collection.stats,
                "records": reports,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_record_human(position: usize, report: &RecordReport) {
    println!("  [{position}] {}", report.summary.to_string().cyan());
    for item in &report.content_list {
        println!(
            "      {:<8} {:<24} {:>8} B  {}",
            item.tag,
            item.name,
            item.size_bytes,
            item.sha256.get(..12).unwrap_or(&item.sha256).dimmed()
        );
    }
}

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let interval = args
        .interval_ms
        .map_or_else(|| config.poll_interval(), Duration::from_millis);
    if interval.is_zero() {
        return Err(CliError::User("--interval-ms must be > 0".to_string()));
    }

    let mut poller = AssetPoller::from_config(&config);
    for dir in &args.dirs {
        if !poller.track(TrainingRun::new(dir)) {
            eprintln!("[ACOL-WATCH] {} listed twice, ignoring", dir.display());
        }
    }

    let mode = output_mode(cli);
    let signal = ShutdownSignal::with_os_signals();
    let mut write_error = None;
    poller.run_until_shutdown(&signal, interval, args.cycles, |outcomes| {
        if let Err(e) = report_cycle(mode, outcomes) {
            write_error = Some(e);
            signal.request();
        }
    });

    write_error.map_or(Ok(()), Err)
}

fn report_cycle(mode: OutputMode, outcomes: &[RunOutcome]) -> Result<(), CliError> {
    for run in outcomes {
        match mode {
            OutputMode::Human => match &run.outcome {
                PollOutcome::Collected { stats } if !stats.metadata_present => {
                    println!("{} {}", run.path.display(), "no metadata".dimmed());
                }
                PollOutcome::Collected { stats } => {
                    let line = format!(
                        "{} records ({} reused, {} fresh, {} dropped)",
                        stats.entries, stats.reused, stats.fresh, stats.dropped
                    );
                    let line = if stats.fresh > 0 || stats.dropped > 0 {
                        line.green()
                    } else {
                        line.normal()
                    };
                    println!("{} {line}", run.path.display());
                }
                PollOutcome::Failed {
                    message, retryable, ..
                } => {
                    let message = if *retryable {
                        message.yellow()
                    } else {
                        message.red()
                    };
                    println!("{} {message}", run.path.display());
                }
            },
            OutputMode::Json => {
                let payload = match &run.outcome {
                    PollOutcome::Collected { stats } => json!({
                        "command": "watch",
                        "path": run.path.to_string_lossy(),
                        "ok": true,
                        "stats": stats,
                    }),
                    PollOutcome::Failed {
                        error_code,
                        message,
                        retryable,
                    } => json!({
                        "command": "watch",
                        "path": run.path.to_string_lossy(),
                        "ok": false,
                        "error_code": error_code,
                        "error_message": message,
                        "retryable": retryable,
                    }),
                };
                write_json_line(&payload)?;
            }
        }
    }
    io::stdout().flush()?;
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                        "hash": config.stable_hash()?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => {
            let config = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{} {}", "valid".green(), config.paths.config_file.display());
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.paths.config_file.to_string_lossy(),
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn emit_version(cli: &Cli) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    match output_mode(cli) {
        OutputMode::Human => println!("acol {version}"),
        OutputMode::Json => {
            let payload = json!({
                "binary": "acol",
                "version": version,
                "package": env!("CARGO_PKG_NAME"),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("ACOL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
