use std::sync::{Arc, Mutex};
use std::time::Duration;

use gaze_core::{Rect, RegionState, Tracker, TrackerCfg, TrackerEvent, channel_sink};
use gaze_sim::{ScriptedSource, Step};
use gaze_traits::ManualClock;
use rstest::rstest;

const BUTTON: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

fn tracker(source: ScriptedSource) -> Tracker {
    Tracker::builder()
        .with_source(source)
        .with_clock(ManualClock::new())
        .with_config(TrackerCfg::default())
        .build()
        .unwrap()
}

fn missing(kind: &str, n: usize) -> Vec<Step> {
    let step = match kind {
        "none" => Step::NoSignal,
        _ => Step::Fault("predictor crashed".into()),
    };
    vec![step; n]
}

#[rstest]
#[case::no_signal("none")]
#[case::errors("fault")]
fn five_missing_ticks_reset_dwell(#[case] kind: &str) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let f = fired.clone();
    let (sink, rx) = channel_sink();
    // In at 0..400, missing at 500..900, in again from 1000
    let source = ScriptedSource::hold(50.0, 50.0, 5)
        .then(missing(kind, 5))
        .then([Step::Gaze(50.0, 50.0)]);
    let mut t = tracker(source);
    t.subscribe(sink);
    t.watch_region("btn", BUTTON, 1000, move |_, ms| f.lock().unwrap().push(ms))
        .unwrap();

    t.advance(Duration::from_millis(900)).unwrap();
    assert!(t.signal_lost());
    assert_eq!(t.region_state("btn"), Some(RegionState::Idle));
    assert_eq!(t.consecutive_failures(), 5);
    // The last smoothed point survives the outage
    assert!(t.current_gaze().is_some());

    t.advance(Duration::from_millis(2000)).unwrap();
    // Fresh window from t=1000, not the original one from t=200
    assert_eq!(*fired.lock().unwrap(), vec![1000]);

    let events: Vec<TrackerEvent> = rx
        .try_iter()
        .filter(|e| !matches!(e, TrackerEvent::StablePoint(_)))
        .collect();
    assert_eq!(
        events,
        vec![
            TrackerEvent::RegionEntered {
                id: "btn".into(),
                at_ms: 200
            },
            TrackerEvent::RegionLeft {
                id: "btn".into(),
                gazed_ms: 700
            },
            TrackerEvent::SignalLost { failures: 5 },
            TrackerEvent::SignalReacquired,
            TrackerEvent::RegionEntered {
                id: "btn".into(),
                at_ms: 1000
            },
            TrackerEvent::RegionTriggered {
                id: "btn".into(),
                elapsed_ms: 1000
            },
        ]
    );
}

#[test]
fn short_outage_keeps_the_original_deadline() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let f = fired.clone();
    let source = ScriptedSource::hold(50.0, 50.0, 5)
        .then(missing("none", 4))
        .then([Step::Gaze(50.0, 50.0)]);
    let mut t = tracker(source);
    t.watch_region("btn", BUTTON, 1000, move |_, ms| f.lock().unwrap().push(ms))
        .unwrap();

    t.advance(Duration::from_millis(2000)).unwrap();
    assert!(!t.signal_lost());
    assert_eq!(*fired.lock().unwrap(), vec![1000]);
}

#[test]
fn signal_lost_is_reported_once_per_outage() {
    let (sink, rx) = channel_sink();
    let source = ScriptedSource::hold(50.0, 50.0, 3)
        .then(missing("none", 20))
        .then([Step::Gaze(50.0, 50.0)])
        .then(missing("none", 6));
    let mut t = tracker(source);
    t.subscribe(sink);
    t.advance(Duration::from_millis(5000)).unwrap();

    let lost = rx
        .try_iter()
        .filter(|e| matches!(e, TrackerEvent::SignalLost { .. }))
        .count();
    assert_eq!(lost, 2);
}
