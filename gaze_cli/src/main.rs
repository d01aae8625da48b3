#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `gaze`: replay traces or simulated fixations through the dwell tracker.

mod cli;
mod error_fmt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use gaze_config::{Config, Logging};
use gaze_core::TrackerError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::RunOpts;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    // Dropped at the end of this fn so the file writer flushes before exit.
    let _file_guard = init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    let result = execute(cli, &cfg);
    if let Err(e) = &result {
        tracing::error!(error = %e, "command failed");
    }
    result
}

fn execute(cli: Cli, cfg: &Config) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Run {
            trace,
            duration_ms,
            realtime,
            points,
            no_predictor,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            if realtime {
                let flag = shutdown.clone();
                ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                    .wrap_err("install Ctrl-C handler")?;
            }
            let opts = RunOpts {
                trace: trace.as_deref(),
                duration_ms,
                realtime,
                points,
                no_predictor,
                json: cli.json,
            };
            let summary = run::run(cfg, &opts, &shutdown)?;
            if cli.json {
                println!("{}", summary.to_json());
            } else {
                println!("{}", summary.to_text());
            }
        }
        Commands::SelfCheck { no_predictor } => {
            let regions = run::self_check(cfg, no_predictor)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "event": "self_check", "ok": true, "regions": regions })
                );
            } else {
                println!("OK ({regions} region(s))");
            }
        }
    }
    Ok(())
}

fn invalid(msg: String) -> eyre::Report {
    eyre::Report::new(TrackerError::InvalidArgument(msg))
}

/// Read, parse and validate the TOML config; defaults when no path is given.
fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = gaze_config::load_toml(&text).map_err(|e| {
        let detail = describe_toml_error(&text, &e);
        invalid(format!("config {}: {detail}", path.display()))
    })?;
    cfg.validate()
        .map_err(|e| invalid(format!("config {}: {e:#}", path.display())))?;
    Ok(cfg)
}

/// Parse error message with the 1-based line it points at, when known.
fn describe_toml_error(text: &str, e: &toml::de::Error) -> String {
    let line = e
        .span()
        .and_then(|span| text.get(..span.start))
        .map(|head| head.matches('\n').count() + 1);
    match line {
        Some(line) => format!("line {line}: {}", e.message()),
        None => e.message().to_string(),
    }
}

/// Console layer on stderr (RUST_LOG wins over --log-level), plus an optional
/// JSON file layer from `[logging]`.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| invalid(format!("logging.file '{file}' has no file name")))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))?;
    Ok(file_guard)
}
