#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and gaze-trace parsing for the dwell tracker.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The trace CSV loader enforces headers and sample ordering so a replay
//!   never feeds the tracker time that runs backwards.
use serde::Deserialize;

/// Default dwell requirement for regions that do not set one.
pub const DEFAULT_DWELL_MS: u64 = 6_000;

/// Gaze trace CSV schema.
///
/// Expected headers:
/// t_ms,x,y
///
/// Empty `x`/`y` cells mark a tick where the predictor saw nothing.
///
/// Example:
/// t_ms,x,y
/// 0,512.0,300.5
/// 100,,
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub t_ms: u64,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl TraceRow {
    /// Both coordinates, when present.
    pub fn point(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerSection {
    /// Samples kept in the smoothing window.
    #[serde(alias = "bufferCapacity")]
    pub buffer_capacity: usize,
    /// Max per-axis standard deviation (px) for a window to count as stable.
    #[serde(alias = "stabilityThresholdPx")]
    pub stability_threshold_px: f64,
    #[serde(alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    /// Missing-signal ticks in a row before every region is reset.
    #[serde(alias = "maxConsecutiveFailures")]
    pub max_consecutive_failures: u32,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            buffer_capacity: 10,
            stability_threshold_px: 50.0,
            poll_interval_ms: 100,
            max_consecutive_failures: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// A static screen region watched by the CLI runner.
#[derive(Debug, Deserialize, Clone)]
pub struct RegionCfg {
    pub id: String,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    #[serde(default = "default_dwell_ms", alias = "durationMs")]
    pub dwell_ms: u64,
}

fn default_dwell_ms() -> u64 {
    DEFAULT_DWELL_MS
}

/// Hold the gaze near (x, y) for `ms`.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Fixation {
    pub x: f64,
    pub y: f64,
    pub ms: u64,
}

/// Report no signal for `ms` starting at `at_ms` into the script.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Dropout {
    pub at_ms: u64,
    pub ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    pub seed: u64,
    /// Uniform noise amplitude added to each axis (px).
    pub jitter_px: f64,
    pub fixations: Vec<Fixation>,
    pub dropouts: Vec<Dropout>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: 7,
            jitter_px: 8.0,
            fixations: Vec::new(),
            dropouts: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub regions: Vec<RegionCfg>,
    #[serde(default)]
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open gaze trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["t_ms", "x", "y"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "gaze trace CSV must have headers 't_ms,x,y', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let row: TraceRow = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if let Some(prev) = rows.last()
            && row.t_ms < prev.t_ms
        {
            eyre::bail!(
                "gaze trace timestamps must be non-decreasing (row {}: {} < {})",
                idx + 2,
                row.t_ms,
                prev.t_ms
            );
        }
        if row.x.is_some() != row.y.is_some() {
            eyre::bail!("row {} has only one coordinate", idx + 2);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("gaze trace {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Tracker
        if self.tracker.buffer_capacity < 3 {
            eyre::bail!("tracker.buffer_capacity must be >= 3");
        }
        if !self.tracker.stability_threshold_px.is_finite()
            || self.tracker.stability_threshold_px <= 0.0
        {
            eyre::bail!("tracker.stability_threshold_px must be a finite value > 0");
        }
        if self.tracker.poll_interval_ms == 0 {
            eyre::bail!("tracker.poll_interval_ms must be >= 1");
        }
        if self.tracker.poll_interval_ms > 60_000 {
            eyre::bail!("tracker.poll_interval_ms is unreasonably large (>60s)");
        }
        if self.tracker.max_consecutive_failures == 0 {
            eyre::bail!("tracker.max_consecutive_failures must be >= 1");
        }

        // Regions
        let mut seen = std::collections::HashSet::new();
        for r in &self.regions {
            if r.id.trim().is_empty() {
                eyre::bail!("regions: id must not be empty");
            }
            if !seen.insert(r.id.as_str()) {
                eyre::bail!("regions: duplicate id '{}'", r.id);
            }
            let coords = [r.left, r.top, r.right, r.bottom];
            if coords.iter().any(|c| !c.is_finite()) {
                eyre::bail!("regions.{}: coordinates must be finite", r.id);
            }
            if r.left >= r.right || r.top >= r.bottom {
                eyre::bail!(
                    "regions.{}: requires left < right and top < bottom",
                    r.id
                );
            }
        }

        // Simulation
        if !self.simulation.jitter_px.is_finite() || self.simulation.jitter_px < 0.0 {
            eyre::bail!("simulation.jitter_px must be a finite value >= 0");
        }
        for f in &self.simulation.fixations {
            if !f.x.is_finite() || !f.y.is_finite() {
                eyre::bail!("simulation.fixations: coordinates must be finite");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{rot}'");
        }

        Ok(())
    }
}
