//! Tracker events and the sinks that observe them.
//!
//! Every state change the pipeline makes is reported as a `TrackerEvent`.
//! Sinks receive events after the pipeline lock is released but while the
//! sink set is locked. A sink gets no tracker handle, and calling
//! `subscribe` or `unsubscribe` from inside `handle` deadlocks.
use crossbeam_channel as xch;

use crate::buffer::StableGazePoint;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A smoothed point was produced for this tick.
    StablePoint(StableGazePoint),
    /// A stable gaze entered an idle region and started its dwell timer.
    RegionEntered { id: String, at_ms: u64 },
    /// Gaze left (or lost stability over) a region before its dwell completed.
    RegionLeft { id: String, gazed_ms: u64 },
    /// Dwell completed; the region's callback has been scheduled.
    RegionTriggered { id: String, elapsed_ms: u64 },
    /// Consecutive missing-signal ticks reached the configured limit.
    SignalLost { failures: u32 },
    /// First valid sample after `SignalLost`.
    SignalReacquired,
}

impl TrackerEvent {
    /// Short snake_case tag, stable for log and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerEvent::StablePoint(_) => "stable_point",
            TrackerEvent::RegionEntered { .. } => "region_entered",
            TrackerEvent::RegionLeft { .. } => "region_left",
            TrackerEvent::RegionTriggered { .. } => "region_triggered",
            TrackerEvent::SignalLost { .. } => "signal_lost",
            TrackerEvent::SignalReacquired => "signal_reacquired",
        }
    }
}

/// Observer of tracker events.
///
/// Override `handle` for a single entry point, or the typed hooks for the
/// events you care about; all hooks default to no-ops.
pub trait EventSink: Send {
    fn on_stable_point(&mut self, _point: &StableGazePoint) {}
    fn on_region_entered(&mut self, _id: &str, _at_ms: u64) {}
    fn on_region_left(&mut self, _id: &str, _gazed_ms: u64) {}
    fn on_region_triggered(&mut self, _id: &str, _elapsed_ms: u64) {}
    fn on_signal_lost(&mut self, _failures: u32) {}
    fn on_signal_reacquired(&mut self) {}

    fn handle(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::StablePoint(p) => self.on_stable_point(p),
            TrackerEvent::RegionEntered { id, at_ms } => self.on_region_entered(id, *at_ms),
            TrackerEvent::RegionLeft { id, gazed_ms } => self.on_region_left(id, *gazed_ms),
            TrackerEvent::RegionTriggered { id, elapsed_ms } => {
                self.on_region_triggered(id, *elapsed_ms)
            }
            TrackerEvent::SignalLost { failures } => self.on_signal_lost(*failures),
            TrackerEvent::SignalReacquired => self.on_signal_reacquired(),
        }
    }
}

/// Adapts a closure into an `EventSink`.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: FnMut(&TrackerEvent) + Send,
{
    fn handle(&mut self, event: &TrackerEvent) {
        (self.0)(event)
    }
}

/// Forwards every event into a crossbeam channel.
pub struct ChannelSink {
    tx: xch::Sender<TrackerEvent>,
}

impl ChannelSink {
    pub fn new(tx: xch::Sender<TrackerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &TrackerEvent) {
        // Receiver gone is not an error for the tracker
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(kind = event.kind(), "event receiver disconnected");
        }
    }
}

/// Unbounded channel sink plus its receiving end.
pub fn channel_sink() -> (ChannelSink, xch::Receiver<TrackerEvent>) {
    let (tx, rx) = xch::unbounded();
    (ChannelSink::new(tx), rx)
}

/// Handle returned by `Tracker::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct SinkSet {
    next_id: u64,
    sinks: Vec<(SubscriptionId, Box<dyn EventSink>)>,
}

impl SinkSet {
    pub(crate) fn add(&mut self, sink: Box<dyn EventSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.sinks.push((id, sink));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sid, _)| *sid != id);
        self.sinks.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.sinks.clear();
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn EventSink>> {
        self.sinks.iter_mut().map(|(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        triggered: Vec<String>,
        lost: u32,
    }

    impl EventSink for Counting {
        fn on_region_triggered(&mut self, id: &str, _elapsed_ms: u64) {
            self.triggered.push(id.to_string());
        }
        fn on_signal_lost(&mut self, _failures: u32) {
            self.lost += 1;
        }
    }

    #[test]
    fn default_handle_dispatches_to_typed_hooks() {
        let mut sink = Counting::default();
        sink.handle(&TrackerEvent::RegionTriggered {
            id: "a".into(),
            elapsed_ms: 3000,
        });
        sink.handle(&TrackerEvent::SignalLost { failures: 5 });
        sink.handle(&TrackerEvent::SignalReacquired);
        assert_eq!(sink.triggered, vec!["a".to_string()]);
        assert_eq!(sink.lost, 1);
    }

    #[test]
    fn channel_sink_forwards_and_tolerates_closed_receiver() {
        let (mut sink, rx) = channel_sink();
        sink.handle(&TrackerEvent::SignalReacquired);
        assert_eq!(rx.try_recv().unwrap(), TrackerEvent::SignalReacquired);
        drop(rx);
        sink.handle(&TrackerEvent::SignalReacquired);
    }

    #[test]
    fn sink_set_add_remove() {
        let mut set = SinkSet::default();
        let a = set.add(Box::new(FnSink(|_: &TrackerEvent| {})));
        let b = set.add(Box::new(FnSink(|_: &TrackerEvent| {})));
        assert_ne!(a, b);
        assert!(set.remove(a));
        assert!(!set.remove(a));
        assert_eq!(set.iter_mut().count(), 1);
    }
}
