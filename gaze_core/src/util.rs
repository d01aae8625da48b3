//! Small shared helpers for gaze_core.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Longest single sleep of the tracker thread; bounds `stop()` latency.
pub const MAX_SLEEP_SLICE_MS: u64 = 50;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Bounds providers run under the pipeline lock and sinks under the sink-set
/// lock, each inside `catch_unwind`, so neither poisons its lock. Dwell
/// callbacks run with no lock held.
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
