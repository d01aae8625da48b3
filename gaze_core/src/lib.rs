#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core gaze tracking logic (predictor-agnostic).
//!
//! This crate turns raw, noisy gaze predictions into smoothed points and
//! dwell-triggered region callbacks. The predictor is reached only through
//! `gaze_traits::SampleSource`; time only through `gaze_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Smoothing**: bounded sample window, mean point, stddev stability (`buffer`)
//! - **Regions**: per-region `Idle -> Gazing -> Triggered` dwell machine (`region`)
//! - **Pipeline**: per-tick intake and signal-loss counting (`pipeline`)
//! - **Polling**: fixed-rate schedule that owns the source (`poller`)
//! - **Tracker**: public handle, event loop, thread or manual drive (`tracker`)
//! - **Events**: typed events and pluggable sinks (`events`)
//!
//! ## Time
//!
//! All timestamps are milliseconds since the tracker was built, read from the
//! injected clock. With `ManualClock` and `Tracker::advance` the whole loop is
//! deterministic.

pub mod buffer;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod mocks;
pub mod pipeline;
pub mod poller;
pub mod region;
pub mod source_error;
pub mod tracker;
pub mod util;

pub use buffer::{GazeSample, SmoothingBuffer, StableGazePoint};
pub use builder::{Missing, Set, TrackerBuilder};
pub use config::TrackerCfg;
pub use error::{BuildError, Result, TrackerError};
pub use events::{ChannelSink, EventSink, FnSink, SubscriptionId, TrackerEvent, channel_sink};
pub use region::{DEFAULT_DWELL_MS, RegionSpec, RegionState};
pub use tracker::{Tracker, WatchHandle};

pub use gaze_traits::{BoundsProvider, Reading, Rect, SampleSource};

/// Build a tracker over `source` and start polling on a background thread.
///
/// Fails with `TrackerError::PredictorUnavailable` when the source reports no
/// predictor; callers decide whether to fall back to another input mode.
pub fn init(cfg: TrackerCfg, source: impl SampleSource + Send + 'static) -> Result<Tracker> {
    Tracker::builder()
        .with_source(source)
        .with_config(cfg)
        .spawn()
}
