//! Public tracker handle and the event loop that drives it.
//!
//! One `Driver` owns the sample source and is the only thing that polls it or
//! advances region state. It runs either on a background thread (`spawn`) or
//! inline from `Tracker::advance` against a manual clock, so a tick is never
//! re-entered. Dwell callbacks and event sinks run after the pipeline lock is
//! released, each isolated with `catch_unwind`.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gaze_traits::{BoundsProvider, SampleSource};
use gaze_traits::clock::Clock;

use crate::buffer::StableGazePoint;
use crate::builder::{Missing, TrackerBuilder};
use crate::error::{Result, TrackerError};
use crate::events::{EventSink, SinkSet, SubscriptionId};
use crate::pipeline::{GazePipeline, TickOutcome};
use crate::poller::Poller;
use crate::region::{DwellCallback, RegionSpec, RegionState};
use crate::util::{MAX_SLEEP_SLICE_MS, duration_ms, lock};

pub(crate) type BoxedSource = Box<dyn SampleSource + Send>;

pub(crate) struct Shared {
    pipeline: Mutex<GazePipeline>,
    sinks: Mutex<SinkSet>,
    paused: AtomicBool,
    stopped: AtomicBool,
    shutdown: AtomicBool,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn pipeline(&self) -> MutexGuard<'_, GazePipeline> {
        lock(&self.pipeline)
    }

    fn dispatch(&self, outcome: TickOutcome) {
        if outcome.is_empty() {
            return;
        }
        let TickOutcome { events, fired } = outcome;
        for mut dwell in fired {
            let Some(cb) = dwell.take_callback() else {
                continue;
            };
            run_callback(cb, &dwell.id, dwell.elapsed_ms);
        }
        let mut sinks = lock(&self.sinks);
        for event in &events {
            for sink in sinks.iter_mut() {
                if catch_unwind(AssertUnwindSafe(|| sink.handle(event))).is_err() {
                    tracing::error!(kind = event.kind(), "event sink panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn run_callback(cb: DwellCallback, id: &str, elapsed_ms: u64) {
    if catch_unwind(AssertUnwindSafe(|| cb(id, elapsed_ms))).is_err() {
        tracing::error!(region = %id, elapsed_ms, "dwell callback panicked");
    }
}

pub(crate) struct Driver {
    poller: Poller<BoxedSource>,
    shared: Arc<Shared>,
    was_paused: bool,
}

impl Driver {
    /// One service pass at the current clock time: fire due deadlines, poll
    /// if due, then fire deadlines the new sample made due. Returns the next
    /// instant worth waking for, or `None` while paused.
    fn service(&mut self) -> Option<u64> {
        let now = self.shared.now_ms();
        if self.shared.paused.load(Ordering::Acquire) {
            self.was_paused = true;
            return None;
        }
        if self.was_paused {
            self.was_paused = false;
            self.poller.resync(now);
        }

        // Deadlines due by `now` fire before this tick's sample is applied.
        let mut outcome = self.shared.pipeline().fire_due(now);
        if let Some(reading) = self.poller.poll_if_due(now) {
            outcome.merge(self.shared.pipeline().on_reading(now, reading));
        }
        let next_deadline = {
            let mut p = self.shared.pipeline();
            outcome.merge(p.fire_due(now));
            p.next_deadline()
        };
        self.shared.dispatch(outcome);

        let next_poll = self.poller.next_poll_ms();
        Some(next_deadline.map_or(next_poll, |d| d.min(next_poll)))
    }

    fn run(mut self) {
        let shared = self.shared.clone();
        let idle_ms = self.poller.interval_ms().min(MAX_SLEEP_SLICE_MS);
        loop {
            if shared.shutdown.load(Ordering::Acquire) {
                tracing::debug!("tracker thread received shutdown signal");
                break;
            }
            let wait_ms = match self.service() {
                Some(wake) => wake
                    .saturating_sub(shared.now_ms())
                    .min(MAX_SLEEP_SLICE_MS),
                None => idle_ms,
            };
            if shared.shutdown.load(Ordering::Acquire) {
                break;
            }
            if wait_ms > 0 {
                shared.clock.sleep(Duration::from_millis(wait_ms));
            }
        }
        tracing::trace!("tracker thread exiting cleanly");
    }
}

/// Stops watching its region when asked. Dropping the handle does nothing.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: String,
    serial: u64,
    shared: Weak<Shared>,
}

impl WatchHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unwatch this registration. Returns `false` if it was already removed,
    /// replaced, or the tracker is gone.
    pub fn stop(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        shared
            .pipeline()
            .regions
            .remove_registration(&self.id, self.serial)
    }
}

/// Gaze tracker: smoothing, dwell detection and signal-loss handling over a
/// polled `SampleSource`.
pub struct Tracker {
    shared: Arc<Shared>,
    driver: Option<Driver>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("shared", &self.shared)
            .field("threaded", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl Tracker {
    pub fn builder() -> TrackerBuilder<Missing> {
        TrackerBuilder::default()
    }

    pub(crate) fn assemble(
        pipeline: GazePipeline,
        source: BoxedSource,
        clock: Arc<dyn Clock + Send + Sync>,
        sinks: SinkSet,
    ) -> Self {
        let epoch = clock.now();
        let interval_ms = pipeline.cfg().poll_interval_ms;
        let shared = Arc::new(Shared {
            pipeline: Mutex::new(pipeline),
            sinks: Mutex::new(sinks),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            clock,
            epoch,
        });
        let driver = Driver {
            poller: Poller::new(source, interval_ms, 0),
            shared: shared.clone(),
            was_paused: false,
        };
        Self {
            shared,
            driver: Some(driver),
            worker: None,
        }
    }

    /// Move the driver of a built tracker onto its own thread. A no-op on a
    /// tracker that is already running there.
    pub fn start(mut self) -> Result<Self> {
        let Some(driver) = self.driver.take() else {
            return Ok(self);
        };
        let handle = std::thread::Builder::new()
            .name("gaze-tracker".into())
            .spawn(move || driver.run())?;
        self.worker = Some(handle);
        tracing::info!("tracker thread started");
        Ok(self)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(eyre::Report::new(TrackerError::Stopped));
        }
        Ok(())
    }

    /// Register a region. Fails on a duplicate id, a missing bounds provider
    /// or a missing callback.
    pub fn watch(&self, spec: RegionSpec) -> Result<WatchHandle> {
        self.ensure_running()?;
        let id = spec.id().to_string();
        let serial = self
            .shared
            .pipeline()
            .watch(spec)
            .map_err(eyre::Report::new)?;
        Ok(WatchHandle {
            id,
            serial,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Shorthand for `watch(RegionSpec::new(id).bounds(..).dwell_ms(..).on_dwell(..))`.
    pub fn watch_region<B, F>(
        &self,
        id: impl Into<String>,
        bounds: B,
        dwell_ms: u64,
        callback: F,
    ) -> Result<WatchHandle>
    where
        B: BoundsProvider + Send + 'static,
        F: FnOnce(&str, u64) + Send + 'static,
    {
        self.watch(
            RegionSpec::new(id)
                .bounds(bounds)
                .dwell_ms(dwell_ms)
                .on_dwell(callback),
        )
    }

    /// Remove a region and cancel its pending deadline.
    pub fn unwatch(&self, id: &str) -> Result<()> {
        self.ensure_running()?;
        self.shared
            .pipeline()
            .regions
            .remove(id)
            .map_err(eyre::Report::new)
    }

    /// Remove every region. Returns how many were removed.
    pub fn unwatch_all(&self) -> usize {
        let n = self.shared.pipeline().regions.clear();
        tracing::debug!(removed = n, "unwatched all regions");
        n
    }

    /// Latest smoothed point, stable or not. `None` before the third sample
    /// and after `stop`.
    pub fn current_gaze(&self) -> Option<StableGazePoint> {
        self.shared.pipeline().current_gaze()
    }

    /// True when the latest point lies strictly within `radius_px` of the
    /// centre of `bounds`. Stability is not required.
    pub fn is_gaze_near(&self, bounds: &impl BoundsProvider, radius_px: f64) -> bool {
        let (cx, cy) = bounds.rect().center();
        self.current_gaze()
            .is_some_and(|p| p.distance_to(cx, cy) < radius_px)
    }

    /// True when the latest point lies inside `bounds`. Stability is not required.
    pub fn is_gaze_in(&self, bounds: &impl BoundsProvider) -> bool {
        let rect = bounds.rect();
        self.current_gaze()
            .is_some_and(|p| rect.contains(p.x, p.y))
    }

    pub fn region_state(&self, id: &str) -> Option<RegionState> {
        self.shared.pipeline().regions.state(id)
    }

    /// All watched regions with their states, ordered by id.
    pub fn regions(&self) -> Vec<(String, RegionState)> {
        self.shared.pipeline().regions.snapshot()
    }

    pub fn signal_lost(&self) -> bool {
        self.shared.pipeline().signal_lost()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.pipeline().consecutive_failures()
    }

    /// Suspend polling and deadline evaluation. Regions keep their state.
    pub fn pause(&self) {
        if !self.shared.paused.swap(true, Ordering::AcqRel) {
            tracing::info!("tracker paused");
        }
    }

    /// Resume after `pause`; the next poll happens immediately.
    pub fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::AcqRel) {
            tracing::info!("tracker resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn subscribe(&self, sink: impl EventSink + 'static) -> SubscriptionId {
        lock(&self.shared.sinks).add(Box::new(sink))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.shared.sinks).remove(id)
    }

    /// Milliseconds on the tracker's clock since construction.
    pub fn now_ms(&self) -> u64 {
        self.shared.now_ms()
    }

    /// The instant `now_ms` counts from.
    pub fn epoch(&self) -> Instant {
        self.shared.epoch
    }

    /// Drive the loop inline for `d` of clock time. Only for trackers built
    /// with `build`/`try_build`; with a `ManualClock` this runs instantly.
    pub fn advance(&mut self, d: Duration) -> Result<()> {
        self.ensure_running()?;
        let Some(driver) = self.driver.as_mut() else {
            return Err(eyre::Report::new(TrackerError::InvalidArgument(
                "tracker runs on its own thread; advance() needs a built tracker".into(),
            )));
        };
        let shared = self.shared.clone();
        let end = shared.now_ms().saturating_add(duration_ms(d));
        loop {
            let next = driver.service();
            let now = shared.now_ms();
            if now >= end {
                break;
            }
            let wake = next.unwrap_or(end).max(now + 1).min(end);
            shared.clock.sleep(Duration::from_millis(wake - now));
        }
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Halt polling, drop all regions, sinks and buffered samples, and release
    /// the sample source. Idempotent.
    pub fn stop(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            tracing::debug!("tracker already stopped");
            return;
        }
        self.join_worker();
        self.driver = None;
        self.shared.pipeline().reset();
        lock(&self.shared.sinks).clear();
        tracing::info!("tracker stopped");
    }

    fn join_worker(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            tracing::error!("tracker thread panicked");
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.join_worker();
    }
}
