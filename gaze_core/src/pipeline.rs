//! Per-tick gaze processing: sample intake, smoothing, region evaluation and
//! signal-loss tracking.
//!
//! `GazePipeline` is pure state plus a caller-supplied timestamp; it never
//! reads a clock, sleeps, or calls user code. Callbacks and events come back
//! in a `TickOutcome` for the caller to dispatch.
use gaze_traits::Reading;

use crate::buffer::{GazeSample, SmoothingBuffer, StableGazePoint};
use crate::config::TrackerCfg;
use crate::error::TrackerError;
use crate::events::TrackerEvent;
use crate::region::{FiredDwell, RegionRegistry, RegionSpec};
use crate::source_error::map_source_error;

pub type SourceResult = Result<Reading, Box<dyn std::error::Error + Send + Sync>>;

/// Everything a tick produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<TrackerEvent>,
    pub fired: Vec<FiredDwell>,
}

impl TickOutcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.fired.is_empty()
    }

    pub(crate) fn merge(&mut self, other: TickOutcome) {
        self.events.extend(other.events);
        self.fired.extend(other.fired);
    }
}

pub struct GazePipeline {
    cfg: TrackerCfg,
    buffer: SmoothingBuffer,
    pub(crate) regions: RegionRegistry,
    failures: u32,
    signal_lost: bool,
    last_point: Option<StableGazePoint>,
}

impl GazePipeline {
    pub fn new(cfg: TrackerCfg) -> Self {
        let buffer = SmoothingBuffer::new(cfg.buffer_capacity, cfg.stability_threshold_px);
        Self {
            cfg,
            buffer,
            regions: RegionRegistry::default(),
            failures: 0,
            signal_lost: false,
            last_point: None,
        }
    }

    pub fn cfg(&self) -> &TrackerCfg {
        &self.cfg
    }

    /// Feed one predictor result taken at `now_ms`.
    pub fn on_reading(&mut self, now_ms: u64, reading: SourceResult) -> TickOutcome {
        let mut out = TickOutcome::default();
        match reading {
            Ok(Reading::Gaze { x, y }) if x.is_finite() && y.is_finite() => {
                self.on_sample(GazeSample {
                    x,
                    y,
                    timestamp_ms: now_ms,
                });
                self.after_success(now_ms, &mut out);
            }
            Ok(Reading::Gaze { x, y }) => {
                tracing::debug!(x, y, "discarding non-finite gaze reading");
                self.on_missing(now_ms, &mut out);
            }
            Ok(Reading::NoSignal) => {
                tracing::trace!("no gaze signal this tick");
                self.on_missing(now_ms, &mut out);
            }
            Err(e) => {
                let err = map_source_error(&*e);
                let failures = self.failures.saturating_add(1);
                if failures >= self.cfg.max_consecutive_failures {
                    tracing::error!(error = %err, failures, "predictor keeps failing");
                } else {
                    tracing::debug!(error = %err, failures, "predictor error");
                }
                self.on_missing(now_ms, &mut out);
            }
        }
        out
    }

    fn on_sample(&mut self, sample: GazeSample) {
        self.buffer.push(sample);
    }

    fn after_success(&mut self, now_ms: u64, out: &mut TickOutcome) {
        self.failures = 0;
        if self.signal_lost {
            self.signal_lost = false;
            tracing::info!("gaze signal reacquired");
            out.events.push(TrackerEvent::SignalReacquired);
        }
        let Some(point) = self.buffer.compute_stable() else {
            return;
        };
        self.last_point = Some(point);
        out.events.push(TrackerEvent::StablePoint(point));
        self.regions.evaluate(&point, now_ms, &mut out.events);
    }

    fn on_missing(&mut self, now_ms: u64, out: &mut TickOutcome) {
        self.failures = self.failures.saturating_add(1);
        if self.failures < self.cfg.max_consecutive_failures {
            return;
        }
        let reset = self.regions.reset_gazing(now_ms, &mut out.events);
        if !self.signal_lost {
            self.signal_lost = true;
            tracing::warn!(
                failures = self.failures,
                regions_reset = reset,
                "gaze signal lost"
            );
            out.events.push(TrackerEvent::SignalLost {
                failures: self.failures,
            });
        }
    }

    /// Register a region. Returns a serial identifying this registration.
    pub fn watch(&mut self, spec: RegionSpec) -> Result<u64, TrackerError> {
        self.regions.insert(spec)
    }

    /// Trigger every region whose dwell deadline is at or before `now_ms`.
    pub fn fire_due(&mut self, now_ms: u64) -> TickOutcome {
        let mut out = TickOutcome::default();
        self.regions
            .fire_due(now_ms, &mut out.events, &mut out.fired);
        out
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.regions.next_deadline()
    }

    /// Most recent smoothed point, if any tick has produced one.
    pub fn current_gaze(&self) -> Option<StableGazePoint> {
        self.last_point
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn signal_lost(&self) -> bool {
        self.signal_lost
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Forget all samples, regions and counters.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.regions.clear();
        self.failures = 0;
        self.signal_lost = false;
        self.last_point = None;
    }
}
