//! Type-state builder for `Tracker`.
//!
//! `build()` and `spawn()` exist only once a sample source has been supplied;
//! `try_build()` and `try_spawn()` are always available and report what is
//! missing at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use gaze_traits::SampleSource;
use gaze_traits::clock::{Clock, MonotonicClock};

use crate::config::TrackerCfg;
use crate::error::{BuildError, Result, TrackerError};
use crate::events::{EventSink, SinkSet};
use crate::pipeline::GazePipeline;
use crate::tracker::{BoxedSource, Tracker};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct TrackerBuilder<S> {
    source: Option<BoxedSource>,
    cfg: Option<TrackerCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sinks: Vec<Box<dyn EventSink>>,
    _s: PhantomData<S>,
}

impl Default for TrackerBuilder<Missing> {
    fn default() -> Self {
        Self {
            source: None,
            cfg: None,
            clock: None,
            sinks: Vec::new(),
            _s: PhantomData,
        }
    }
}

/// Reject configs the pipeline cannot run with.
pub fn validate_cfg(cfg: &TrackerCfg) -> Result<()> {
    if cfg.buffer_capacity < crate::buffer::MIN_SAMPLES {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "buffer_capacity must be >= 3",
        )));
    }
    if !cfg.stability_threshold_px.is_finite() || cfg.stability_threshold_px <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "stability_threshold_px must be finite and > 0",
        )));
    }
    if cfg.poll_interval_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll_interval_ms must be >= 1",
        )));
    }
    if cfg.max_consecutive_failures == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_consecutive_failures must be >= 1",
        )));
    }
    Ok(())
}

impl<S> TrackerBuilder<S> {
    pub fn with_source(self, source: impl SampleSource + Send + 'static) -> TrackerBuilder<Set> {
        TrackerBuilder {
            source: Some(Box::new(source)),
            cfg: self.cfg,
            clock: self.clock,
            sinks: self.sinks,
            _s: PhantomData,
        }
    }

    pub fn with_config(mut self, cfg: TrackerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Inject a clock (tests and trace replay use `ManualClock`).
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Validate and construct a tracker driven by `Tracker::advance`.
    pub fn try_build(self) -> Result<Tracker> {
        let source = self
            .source
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSource))?;
        let cfg = self.cfg.unwrap_or_default();
        validate_cfg(&cfg)?;
        if !source.available() {
            tracing::warn!("gaze predictor unavailable");
            return Err(eyre::Report::new(TrackerError::PredictorUnavailable));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let mut sinks = SinkSet::default();
        for sink in self.sinks {
            sinks.add(sink);
        }
        tracing::debug!(
            buffer_capacity = cfg.buffer_capacity,
            threshold_px = cfg.stability_threshold_px,
            poll_interval_ms = cfg.poll_interval_ms,
            max_failures = cfg.max_consecutive_failures,
            "tracker configured"
        );
        Ok(Tracker::assemble(
            GazePipeline::new(cfg),
            source,
            clock,
            sinks,
        ))
    }

    /// Validate, construct and start the tracker on a background thread.
    pub fn try_spawn(self) -> Result<Tracker> {
        self.try_build()?.start()
    }
}

impl TrackerBuilder<Set> {
    pub fn build(self) -> Result<Tracker> {
        self.try_build()
    }

    pub fn spawn(self) -> Result<Tracker> {
        self.try_spawn()
    }
}
