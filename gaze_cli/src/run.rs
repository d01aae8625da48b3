//! Session assembly and execution: config mapping, source selection, event output.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use gaze_config::Config;
use gaze_core::mocks::NullSource;
use gaze_core::conversions::region_bounds;
use gaze_core::{EventSink, SampleSource, Tracker, TrackerCfg, TrackerError, TrackerEvent};
use gaze_sim::{FixationSource, TraceSource};
use gaze_traits::clock::{Clock, ManualClock, MonotonicClock};
use serde_json::json;

type DynClock = Arc<dyn Clock + Send + Sync>;
type BoxedSource = Box<dyn SampleSource + Send>;

/// Options for `gaze run`, resolved from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOpts<'a> {
    pub trace: Option<&'a Path>,
    pub duration_ms: Option<u64>,
    pub realtime: bool,
    pub points: bool,
    pub no_predictor: bool,
    pub json: bool,
}

/// What a finished run reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub triggered: Vec<(String, u64)>,
    pub signal_lost: bool,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        let triggered: Vec<_> = self
            .triggered
            .iter()
            .map(|(id, elapsed_ms)| json!({ "id": id, "elapsed_ms": elapsed_ms }))
            .collect();
        json!({
            "event": "summary",
            "duration_ms": self.duration_ms,
            "triggered": triggered,
            "signal_lost": self.signal_lost,
            "interrupted": self.interrupted,
        })
    }

    pub fn to_text(&self) -> String {
        let ids: Vec<String> = self
            .triggered
            .iter()
            .map(|(id, ms)| format!("{id} ({ms} ms)"))
            .collect();
        let list = if ids.is_empty() {
            "none".to_string()
        } else {
            ids.join(", ")
        };
        format!(
            "run finished after {} ms; triggered: {list}{}",
            self.duration_ms,
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

fn invalid(msg: String) -> eyre::Report {
    eyre::Report::new(TrackerError::InvalidArgument(msg))
}

/// Pick the gaze source and its natural run length in ms.
fn make_source(
    cfg: &Config,
    trace: Option<&Path>,
    no_predictor: bool,
    clock: DynClock,
) -> eyre::Result<(BoxedSource, u64)> {
    if no_predictor {
        return Ok((Box::new(NullSource), 0));
    }
    match trace {
        Some(path) => {
            let rows = gaze_config::load_trace_csv(path).map_err(|e| invalid(format!("{e:#}")))?;
            let src = TraceSource::new(rows, clock);
            let end = src.end_ms().unwrap_or(0);
            tracing::info!(path = %path.display(), end_ms = end, "replaying gaze trace");
            Ok((Box::new(src), end))
        }
        None => {
            let src = FixationSource::from_config(&cfg.simulation, clock);
            let len = src.script_ms();
            tracing::info!(
                fixations = cfg.simulation.fixations.len(),
                script_ms = len,
                "simulating fixations"
            );
            Ok((Box::new(src), len))
        }
    }
}

/// One JSON object per event; `t_ms` is tracker time.
pub fn event_json(t_ms: u64, event: &TrackerEvent) -> serde_json::Value {
    let kind = event.kind();
    match event {
        TrackerEvent::StablePoint(p) => {
            json!({ "event": kind, "t_ms": t_ms, "x": p.x, "y": p.y, "stable": p.stable })
        }
        TrackerEvent::RegionEntered { id, at_ms } => {
            json!({ "event": kind, "t_ms": t_ms, "id": id, "at_ms": at_ms })
        }
        TrackerEvent::RegionLeft { id, gazed_ms } => {
            json!({ "event": kind, "t_ms": t_ms, "id": id, "gazed_ms": gazed_ms })
        }
        TrackerEvent::RegionTriggered { id, elapsed_ms } => {
            json!({ "event": kind, "t_ms": t_ms, "id": id, "elapsed_ms": elapsed_ms })
        }
        TrackerEvent::SignalLost { failures } => {
            json!({ "event": kind, "t_ms": t_ms, "failures": failures })
        }
        TrackerEvent::SignalReacquired => json!({ "event": kind, "t_ms": t_ms }),
    }
}

pub fn event_text(t_ms: u64, event: &TrackerEvent) -> String {
    let kind = event.kind();
    let detail = match event {
        TrackerEvent::StablePoint(p) => format!(
            "({:.1}, {:.1}){}",
            p.x,
            p.y,
            if p.stable { "" } else { " unstable" }
        ),
        TrackerEvent::RegionEntered { id, .. } => id.clone(),
        TrackerEvent::RegionLeft { id, gazed_ms } => format!("{id} after {gazed_ms} ms"),
        TrackerEvent::RegionTriggered { id, elapsed_ms } => format!("{id} after {elapsed_ms} ms"),
        TrackerEvent::SignalLost { failures } => format!("after {failures} failed polls"),
        TrackerEvent::SignalReacquired => String::new(),
    };
    format!("[{t_ms:>6} ms] {kind} {detail}").trim_end().to_string()
}

/// Prints events to stdout as they are dispatched.
struct PrintSink {
    json: bool,
    points: bool,
    clock: DynClock,
    epoch: Instant,
}

impl EventSink for PrintSink {
    fn handle(&mut self, event: &TrackerEvent) {
        if !self.points && matches!(event, TrackerEvent::StablePoint(_)) {
            return;
        }
        let t_ms = self.clock.ms_since(self.epoch);
        if self.json {
            println!("{}", event_json(t_ms, event));
        } else {
            println!("{}", event_text(t_ms, event));
        }
    }
}

/// Drive one tracking session over the configured regions.
pub fn run(cfg: &Config, opts: &RunOpts<'_>, shutdown: &Arc<AtomicBool>) -> eyre::Result<RunSummary> {
    let tcfg: TrackerCfg = (&cfg.tracker).into();
    let clock: DynClock = if opts.realtime {
        Arc::new(MonotonicClock::new())
    } else {
        Arc::new(ManualClock::new())
    };
    let (source, natural_ms) = make_source(cfg, opts.trace, opts.no_predictor, clock.clone())?;
    let duration_ms = opts.duration_ms.unwrap_or(natural_ms);

    let mut tracker = Tracker::builder()
        .with_source(source)
        .with_config(tcfg)
        .with_clock(clock.clone())
        .build()?;
    tracker.subscribe(PrintSink {
        json: opts.json,
        points: opts.points,
        epoch: tracker.epoch(),
        clock,
    });

    let triggered: Arc<Mutex<Vec<(String, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    for r in &cfg.regions {
        let hits = triggered.clone();
        tracker.watch_region(r.id.clone(), region_bounds(r), r.dwell_ms, move |id, elapsed_ms| {
            tracing::info!(region = %id, elapsed_ms, "region activated");
            hits.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((id.to_string(), elapsed_ms));
        })?;
    }
    tracing::debug!(regions = cfg.regions.len(), duration_ms, "session ready");
    if opts.realtime {
        tracker = tracker.start()?;
    }

    let mut interrupted = false;
    if opts.realtime {
        let deadline = Duration::from_millis(duration_ms);
        let started = Instant::now();
        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::warn!("interrupted; stopping tracker");
                interrupted = true;
                break;
            }
            let left = deadline.saturating_sub(started.elapsed());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(Duration::from_millis(20)));
        }
    } else {
        tracker.advance(Duration::from_millis(duration_ms))?;
    }

    let ran_ms = tracker.now_ms();
    let signal_lost = tracker.signal_lost();
    tracker.stop();

    let triggered = std::mem::take(&mut *triggered.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(RunSummary {
        duration_ms: ran_ms,
        triggered,
        signal_lost,
        interrupted,
    })
}

/// Build a tracker from config without running it: validates the tracker
/// table, the predictor capability and every region.
pub fn self_check(cfg: &Config, no_predictor: bool) -> eyre::Result<usize> {
    let tcfg: TrackerCfg = (&cfg.tracker).into();
    let clock = ManualClock::new();
    let (source, _) = make_source(cfg, None, no_predictor, Arc::new(clock.clone()))?;
    let mut tracker = Tracker::builder()
        .with_source(source)
        .with_config(tcfg)
        .with_clock(clock)
        .build()?;
    for r in &cfg.regions {
        tracker.watch_region(r.id.clone(), region_bounds(r), r.dwell_ms, |_, _| {})?;
    }
    let n = tracker.regions().len();
    tracker.stop();
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_region(dwell_ms: u64) -> Config {
        gaze_config::load_toml(&format!(
            r#"
[[regions]]
id = "btn"
left = 0.0
top = 0.0
right = 100.0
bottom = 100.0
dwell_ms = {dwell_ms}

[simulation]
jitter_px = 2.0

[[simulation.fixations]]
x = 50.0
y = 50.0
ms = 2000
"#
        ))
        .unwrap()
    }

    #[test]
    fn simulated_fixation_triggers_region() {
        let cfg = cfg_with_region(1000);
        let shutdown = Arc::new(AtomicBool::new(false));
        let summary = run(&cfg, &RunOpts::default(), &shutdown).unwrap();
        assert_eq!(summary.duration_ms, 2000);
        assert_eq!(summary.triggered, vec![("btn".to_string(), 1000)]);
        assert!(!summary.interrupted);
    }

    #[test]
    fn duration_override_cuts_run_short() {
        let cfg = cfg_with_region(1000);
        let shutdown = Arc::new(AtomicBool::new(false));
        let opts = RunOpts {
            duration_ms: Some(900),
            ..RunOpts::default()
        };
        let summary = run(&cfg, &opts, &shutdown).unwrap();
        assert!(summary.triggered.is_empty());
    }

    #[test]
    fn realtime_run_uses_the_tracker_thread() {
        let cfg = cfg_with_region(100);
        let shutdown = Arc::new(AtomicBool::new(false));
        let opts = RunOpts {
            duration_ms: Some(1000),
            realtime: true,
            ..RunOpts::default()
        };
        let summary = run(&cfg, &opts, &shutdown).unwrap();
        assert!(summary.duration_ms >= 1000);
        assert_eq!(summary.triggered.len(), 1);
        assert!(summary.triggered[0].1 >= 100);
        assert!(!summary.interrupted);
    }

    #[test]
    fn self_check_counts_regions() {
        assert_eq!(self_check(&cfg_with_region(500), false).unwrap(), 1);
        let err = self_check(&cfg_with_region(500), true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::PredictorUnavailable)
        );
    }

    #[test]
    fn text_lines_name_kind_and_region() {
        let line = event_text(
            1200,
            &TrackerEvent::RegionTriggered {
                id: "btn".into(),
                elapsed_ms: 1000,
            },
        );
        assert_eq!(line, "[  1200 ms] region_triggered btn after 1000 ms");
        assert_eq!(
            event_text(5, &TrackerEvent::SignalReacquired),
            "[     5 ms] signal_reacquired"
        );
    }

    #[test]
    fn summary_json_lists_triggers() {
        let s = RunSummary {
            duration_ms: 10,
            triggered: vec![("a".into(), 3)],
            signal_lost: false,
            interrupted: false,
        };
        let v = s.to_json();
        assert_eq!(v["event"], "summary");
        assert_eq!(v["triggered"][0]["id"], "a");
        assert_eq!(v["triggered"][0]["elapsed_ms"], 3);
    }
}
