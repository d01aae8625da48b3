//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "gaze", version, about = "Gaze dwell tracker CLI")]
pub struct Cli {
    /// Path to config TOML (typed). Built-in defaults are used when omitted.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print events and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the tracker over a recorded trace or the configured simulation
    Run {
        /// Gaze trace CSV with headers `t_ms,x,y`; empty x/y means no signal
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,
        /// How long to run in ms (default: length of the trace or simulation script)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Poll on a background thread in wall-clock time (Ctrl-C stops early)
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
        /// Also print every smoothed point
        #[arg(long, action = ArgAction::SetTrue)]
        points: bool,
        /// Behave as if no gaze predictor is installed
        #[arg(long, action = ArgAction::SetTrue)]
        no_predictor: bool,
    },
    /// Validate config and check the predictor capability
    SelfCheck {
        /// Behave as if no gaze predictor is installed
        #[arg(long, action = ArgAction::SetTrue)]
        no_predictor: bool,
    },
}
