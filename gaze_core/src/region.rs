//! Watched regions and their dwell state machine.
//!
//! ```text
//! Idle --stable gaze inside--> Gazing --deadline reached--> Triggered
//!   ^                             |
//!   +---- gaze left / unstable ---+
//!   +---- signal lost ------------+
//! ```
//!
//! `Triggered` is terminal: the callback fires at most once per registration.
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use gaze_traits::BoundsProvider;

use crate::buffer::StableGazePoint;
use crate::error::TrackerError;
use crate::events::TrackerEvent;
use crate::util::duration_ms;

pub const DEFAULT_DWELL_MS: u64 = gaze_config::DEFAULT_DWELL_MS;

/// Invoked once with the region id and the elapsed dwell in milliseconds.
pub type DwellCallback = Box<dyn FnOnce(&str, u64) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Idle,
    Gazing,
    Triggered,
}

/// Registration request for a watched region.
pub struct RegionSpec {
    id: String,
    bounds: Option<Box<dyn BoundsProvider + Send>>,
    dwell_ms: u64,
    callback: Option<DwellCallback>,
}

impl RegionSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bounds: None,
            dwell_ms: DEFAULT_DWELL_MS,
            callback: None,
        }
    }

    /// Bounds are re-queried every tick.
    pub fn bounds(mut self, bounds: impl BoundsProvider + Send + 'static) -> Self {
        self.bounds = Some(Box::new(bounds));
        self
    }

    pub fn dwell_ms(mut self, ms: u64) -> Self {
        self.dwell_ms = ms;
        self
    }

    pub fn dwell(self, d: Duration) -> Self {
        self.dwell_ms(duration_ms(d))
    }

    pub fn on_dwell<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&str, u64) + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) struct WatchedRegion {
    serial: u64,
    bounds: Box<dyn BoundsProvider + Send>,
    dwell_ms: u64,
    callback: Option<DwellCallback>,
    state: RegionState,
    gaze_start_ms: Option<u64>,
    deadline_ms: Option<u64>,
}

impl WatchedRegion {
    fn to_idle(&mut self) -> u64 {
        self.state = RegionState::Idle;
        self.deadline_ms = None;
        self.gaze_start_ms.take().unwrap_or(0)
    }
}

/// A completed dwell whose callback still has to be run.
pub struct FiredDwell {
    pub id: String,
    pub elapsed_ms: u64,
    pub(crate) callback: Option<DwellCallback>,
}

impl std::fmt::Debug for FiredDwell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiredDwell")
            .field("id", &self.id)
            .field("elapsed_ms", &self.elapsed_ms)
            .finish_non_exhaustive()
    }
}

impl FiredDwell {
    pub(crate) fn take_callback(&mut self) -> Option<DwellCallback> {
        self.callback.take()
    }
}

#[derive(Default)]
pub(crate) struct RegionRegistry {
    regions: BTreeMap<String, WatchedRegion>,
    next_serial: u64,
}

impl RegionRegistry {
    /// Register a region; returns a serial unique to this registration.
    pub(crate) fn insert(&mut self, spec: RegionSpec) -> Result<u64, TrackerError> {
        let RegionSpec {
            id,
            bounds,
            dwell_ms,
            callback,
        } = spec;
        if id.is_empty() {
            return Err(TrackerError::InvalidArgument("region id is empty".into()));
        }
        let Some(bounds) = bounds else {
            return Err(TrackerError::InvalidArgument(format!(
                "region '{id}' has no bounds provider"
            )));
        };
        let Some(callback) = callback else {
            return Err(TrackerError::InvalidArgument(format!(
                "region '{id}' has no dwell callback"
            )));
        };
        if self.regions.contains_key(&id) {
            return Err(TrackerError::InvalidArgument(format!(
                "region '{id}' is already watched"
            )));
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        tracing::debug!(region = %id, dwell_ms, "watching region");
        self.regions.insert(
            id,
            WatchedRegion {
                serial,
                bounds,
                dwell_ms,
                callback: Some(callback),
                state: RegionState::Idle,
                gaze_start_ms: None,
                deadline_ms: None,
            },
        );
        Ok(serial)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Result<(), TrackerError> {
        match self.regions.remove(id) {
            Some(r) => {
                tracing::debug!(region = %id, state = ?r.state, "unwatched region");
                Ok(())
            }
            None => Err(TrackerError::NotFound(id.to_string())),
        }
    }

    /// Remove `id` only if it is still the registration identified by `serial`.
    pub(crate) fn remove_registration(&mut self, id: &str, serial: u64) -> bool {
        if self.regions.get(id).is_some_and(|r| r.serial == serial) {
            self.regions.remove(id);
            tracing::debug!(region = %id, "watch handle stopped");
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) -> usize {
        let n = self.regions.len();
        self.regions.clear();
        n
    }

    /// Run every non-triggered region against this tick's smoothed point.
    ///
    /// Runs under the pipeline lock.
    pub(crate) fn evaluate(
        &mut self,
        point: &StableGazePoint,
        now_ms: u64,
        events: &mut Vec<TrackerEvent>,
    ) {
        for (id, region) in self.regions.iter_mut() {
            if region.state == RegionState::Triggered {
                continue;
            }
            let inside = point.stable && gaze_inside(id, region.bounds.as_ref(), point);
            match (region.state, inside) {
                (RegionState::Idle, true) => {
                    region.state = RegionState::Gazing;
                    region.gaze_start_ms = Some(now_ms);
                    region.deadline_ms = Some(now_ms.saturating_add(region.dwell_ms));
                    tracing::debug!(region = %id, at_ms = now_ms, "dwell started");
                    events.push(TrackerEvent::RegionEntered {
                        id: id.clone(),
                        at_ms: now_ms,
                    });
                }
                (RegionState::Gazing, false) => {
                    let start = region.to_idle();
                    let gazed_ms = now_ms.saturating_sub(start);
                    tracing::debug!(region = %id, gazed_ms, "dwell interrupted");
                    events.push(TrackerEvent::RegionLeft {
                        id: id.clone(),
                        gazed_ms,
                    });
                }
                _ => {}
            }
        }
    }

    /// Move every region whose deadline has passed into `Triggered`.
    pub(crate) fn fire_due(
        &mut self,
        now_ms: u64,
        events: &mut Vec<TrackerEvent>,
        fired: &mut Vec<FiredDwell>,
    ) {
        for (id, region) in self.regions.iter_mut() {
            let due = matches!(region.deadline_ms, Some(d) if d <= now_ms);
            if !due || region.state != RegionState::Gazing {
                continue;
            }
            region.deadline_ms = None;
            let Some(callback) = region.callback.take() else {
                continue;
            };
            region.state = RegionState::Triggered;
            let elapsed_ms = now_ms.saturating_sub(region.gaze_start_ms.unwrap_or(now_ms));
            tracing::info!(region = %id, elapsed_ms, "dwell triggered");
            events.push(TrackerEvent::RegionTriggered {
                id: id.clone(),
                elapsed_ms,
            });
            fired.push(FiredDwell {
                id: id.clone(),
                elapsed_ms,
                callback: Some(callback),
            });
        }
    }

    /// Drop every in-progress dwell back to idle.
    pub(crate) fn reset_gazing(&mut self, now_ms: u64, events: &mut Vec<TrackerEvent>) -> usize {
        let mut n = 0;
        for (id, region) in self.regions.iter_mut() {
            if region.state == RegionState::Gazing {
                let start = region.to_idle();
                events.push(TrackerEvent::RegionLeft {
                    id: id.clone(),
                    gazed_ms: now_ms.saturating_sub(start),
                });
                n += 1;
            }
        }
        n
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.regions.values().filter_map(|r| r.deadline_ms).min()
    }

    pub(crate) fn state(&self, id: &str) -> Option<RegionState> {
        self.regions.get(id).map(|r| r.state)
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, RegionState)> {
        self.regions
            .iter()
            .map(|(id, r)| (id.clone(), r.state))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }
}

/// A panicking bounds provider counts as gaze outside its region.
fn gaze_inside(id: &str, bounds: &(dyn BoundsProvider + Send), point: &StableGazePoint) -> bool {
    match catch_unwind(AssertUnwindSafe(|| bounds.rect())) {
        Ok(rect) => rect.contains(point.x, point.y),
        Err(_) => {
            tracing::error!(region = %id, "bounds provider panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaze_traits::Rect;

    const STABLE_IN: StableGazePoint = StableGazePoint {
        x: 50.0,
        y: 50.0,
        stable: true,
    };

    fn spec(id: &str, dwell_ms: u64) -> RegionSpec {
        RegionSpec::new(id)
            .bounds(Rect::new(0.0, 0.0, 100.0, 100.0))
            .dwell_ms(dwell_ms)
            .on_dwell(|_, _| {})
    }

    #[test]
    fn rejects_incomplete_specs() {
        let mut reg = RegionRegistry::default();
        let no_bounds = RegionSpec::new("a").on_dwell(|_, _| {});
        assert!(matches!(
            reg.insert(no_bounds),
            Err(TrackerError::InvalidArgument(_))
        ));
        let no_cb = RegionSpec::new("a").bounds(Rect::default());
        assert!(matches!(
            reg.insert(no_cb),
            Err(TrackerError::InvalidArgument(_))
        ));
        assert!(matches!(
            reg.insert(spec("", 10)),
            Err(TrackerError::InvalidArgument(_))
        ));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn duplicate_id_keeps_original() {
        let mut reg = RegionRegistry::default();
        let first = reg.insert(spec("a", 100)).unwrap();
        assert!(reg.insert(spec("a", 200)).is_err());
        assert!(!reg.remove_registration("a", first + 1));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.remove("missing"), Err(TrackerError::NotFound("missing".into())));
    }

    #[test]
    fn deadline_fires_once() {
        let mut reg = RegionRegistry::default();
        reg.insert(spec("a", 300)).unwrap();
        let mut ev = Vec::new();
        let mut fired = Vec::new();
        reg.evaluate(&STABLE_IN, 1000, &mut ev);
        assert_eq!(reg.state("a"), Some(RegionState::Gazing));
        assert_eq!(reg.next_deadline(), Some(1300));

        reg.fire_due(1299, &mut ev, &mut fired);
        assert!(fired.is_empty());
        reg.fire_due(1300, &mut ev, &mut fired);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].elapsed_ms, 300);
        assert_eq!(reg.state("a"), Some(RegionState::Triggered));

        // Terminal: further gaze and deadlines do nothing
        reg.evaluate(&STABLE_IN, 1400, &mut ev);
        reg.fire_due(5000, &mut ev, &mut fired);
        assert_eq!(fired.len(), 1);
        assert_eq!(reg.next_deadline(), None);
    }

    #[test]
    fn unstable_point_inside_interrupts_dwell() {
        let mut reg = RegionRegistry::default();
        reg.insert(spec("a", 300)).unwrap();
        let mut ev = Vec::new();
        reg.evaluate(&STABLE_IN, 0, &mut ev);
        let shaky = StableGazePoint {
            stable: false,
            ..STABLE_IN
        };
        reg.evaluate(&shaky, 100, &mut ev);
        assert_eq!(reg.state("a"), Some(RegionState::Idle));
        assert_eq!(
            ev.last(),
            Some(&TrackerEvent::RegionLeft {
                id: "a".into(),
                gazed_ms: 100
            })
        );
    }

    #[test]
    fn reset_gazing_only_touches_gazing() {
        let mut reg = RegionRegistry::default();
        reg.insert(spec("a", 100)).unwrap();
        reg.insert(
            RegionSpec::new("far")
                .bounds(Rect::new(500.0, 500.0, 600.0, 600.0))
                .on_dwell(|_, _| {}),
        )
        .unwrap();
        let mut ev = Vec::new();
        reg.evaluate(&STABLE_IN, 0, &mut ev);
        assert_eq!(reg.reset_gazing(50, &mut ev), 1);
        assert_eq!(reg.state("a"), Some(RegionState::Idle));
        assert_eq!(reg.state("far"), Some(RegionState::Idle));
    }

    #[test]
    fn panicking_bounds_count_as_outside() {
        let mut reg = RegionRegistry::default();
        reg.insert(
            RegionSpec::new("broken")
                .bounds(|| -> Rect { panic!("layout gone") })
                .on_dwell(|_, _| {}),
        )
        .unwrap();
        reg.insert(spec("ok", 300)).unwrap();
        let mut ev = Vec::new();
        reg.evaluate(&STABLE_IN, 0, &mut ev);
        assert_eq!(reg.state("broken"), Some(RegionState::Idle));
        assert_eq!(reg.state("ok"), Some(RegionState::Gazing));
    }
}
