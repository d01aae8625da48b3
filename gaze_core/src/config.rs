//! Runtime configuration for the tracker.
//!
//! Separate from the TOML-deserialized config in `gaze_config`; see
//! `conversions` for the bridge.

/// Pipeline tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerCfg {
    /// Samples kept in the smoothing window. Must be >= 3.
    pub buffer_capacity: usize,
    /// A window is stable when both per-axis standard deviations are below this (px).
    pub stability_threshold_px: f64,
    /// Fixed poll period in milliseconds.
    pub poll_interval_ms: u64,
    /// Missing-signal ticks in a row before all regions reset to idle.
    pub max_consecutive_failures: u32,
}

impl Default for TrackerCfg {
    fn default() -> Self {
        Self {
            buffer_capacity: 10,
            stability_threshold_px: 50.0,
            poll_interval_ms: 100,
            max_consecutive_failures: 5,
        }
    }
}
