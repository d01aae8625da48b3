//! Fixed-rate polling schedule around a `SampleSource`.
//!
//! The poller owns the source. Missed slots are dropped rather than replayed
//! in a burst: if the schedule falls behind, the next poll lands on the first
//! grid slot after the late one.
use gaze_traits::SampleSource;

use crate::pipeline::SourceResult;

pub struct Poller<S: SampleSource> {
    source: S,
    interval_ms: u64,
    next_poll_ms: u64,
    polls: u64,
}

impl<S: SampleSource> Poller<S> {
    /// First poll is due at `start_ms`.
    pub fn new(source: S, interval_ms: u64, start_ms: u64) -> Self {
        Self {
            source,
            interval_ms: interval_ms.max(1),
            next_poll_ms: start_ms,
            polls: 0,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_poll_ms
    }

    pub fn next_poll_ms(&self) -> u64 {
        self.next_poll_ms
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Poll the source if a slot is due at `now_ms`.
    pub fn poll_if_due(&mut self, now_ms: u64) -> Option<SourceResult> {
        if !self.is_due(now_ms) {
            return None;
        }
        let reading = self.source.poll();
        self.polls += 1;
        self.next_poll_ms = self.next_poll_ms.saturating_add(self.interval_ms);
        if self.next_poll_ms <= now_ms {
            let missed = (now_ms - self.next_poll_ms) / self.interval_ms + 1;
            tracing::trace!(missed, "poll schedule behind; skipping slots");
            self.next_poll_ms = self
                .next_poll_ms
                .saturating_add(missed.saturating_mul(self.interval_ms));
        }
        Some(reading)
    }

    /// Restart the schedule so the next poll happens at `now_ms`.
    pub fn resync(&mut self, now_ms: u64) {
        self.next_poll_ms = now_ms;
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
