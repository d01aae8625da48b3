//! Simulated gaze predictors for demos, replays and tests.
//!
//! Every source here implements `gaze_traits::SampleSource`. Clock-driven
//! sources read the injected clock on each poll, so a `ManualClock` makes
//! them fully deterministic.
pub mod error;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use gaze_config::{Simulation, TraceRow};
use gaze_traits::{Clock, Reading, SampleSource};

pub use error::SimError;

type DynClock = Arc<dyn Clock + Send + Sync>;

/// One scripted predictor answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Gaze(f64, f64),
    NoSignal,
    Fault(String),
}

/// Replays a fixed list of answers, one per poll. Once the script runs out
/// the final step repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    last: Step,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            last: Step::NoSignal,
        }
    }

    /// `n` copies of the same gaze position.
    pub fn hold(x: f64, y: f64, n: usize) -> Self {
        Self::new(std::iter::repeat_n(Step::Gaze(x, y), n))
    }

    /// Append more steps to the end of the script.
    pub fn then(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    fn next_step(&mut self) -> error::Result<Step> {
        if let Some(step) = self.steps.pop_front() {
            self.last = step;
        }
        match &self.last {
            Step::Fault(msg) => Err(SimError::Fault(msg.clone())),
            other => Ok(other.clone()),
        }
    }
}

impl SampleSource for ScriptedSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        match self.next_step()? {
            Step::Gaze(x, y) => Ok(Reading::Gaze { x, y }),
            _ => Ok(Reading::NoSignal),
        }
    }
}

/// Small xorshift PRNG; deterministic for a given seed.
#[derive(Debug, Clone)]
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    /// Uniform in [-1.0, 1.0).
    fn next_signed(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        let unit = (x >> 11) as f64 / (1u64 << 53) as f64;
        unit * 2.0 - 1.0
    }
}

/// Walks through a fixation script in clock time, adding uniform jitter.
///
/// Each fixation holds the gaze near its (x, y) for its duration; dropouts
/// report `NoSignal`. Past the end of the script the last fixation holds.
pub struct FixationSource {
    fixations: Vec<(f64, f64, u64)>,
    dropouts: Vec<(u64, u64)>,
    jitter_px: f64,
    rng: XorShift,
    clock: DynClock,
    epoch: Instant,
}

impl FixationSource {
    pub fn new(
        fixations: Vec<(f64, f64, u64)>,
        jitter_px: f64,
        seed: u64,
        clock: DynClock,
    ) -> Self {
        let epoch = clock.now();
        Self {
            fixations,
            dropouts: Vec::new(),
            jitter_px: jitter_px.max(0.0),
            rng: XorShift::new(seed),
            clock,
            epoch,
        }
    }

    pub fn from_config(sim: &Simulation, clock: DynClock) -> Self {
        let fixations = sim.fixations.iter().map(|f| (f.x, f.y, f.ms)).collect();
        let mut src = Self::new(fixations, sim.jitter_px, sim.seed, clock);
        src.dropouts = sim.dropouts.iter().map(|d| (d.at_ms, d.ms)).collect();
        src
    }

    pub fn with_dropout(mut self, at_ms: u64, ms: u64) -> Self {
        self.dropouts.push((at_ms, ms));
        self
    }

    /// Total scripted duration.
    pub fn script_ms(&self) -> u64 {
        self.fixations.iter().map(|f| f.2).sum()
    }

    fn target_at(&self, t_ms: u64) -> Option<(f64, f64)> {
        let mut start = 0u64;
        for &(x, y, ms) in &self.fixations {
            if t_ms < start.saturating_add(ms) {
                return Some((x, y));
            }
            start = start.saturating_add(ms);
        }
        self.fixations.last().map(|&(x, y, _)| (x, y))
    }
}

impl SampleSource for FixationSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.clock.ms_since(self.epoch);
        if self
            .dropouts
            .iter()
            .any(|&(at, ms)| t >= at && t < at.saturating_add(ms))
        {
            return Ok(Reading::NoSignal);
        }
        let Some((x, y)) = self.target_at(t) else {
            return Ok(Reading::NoSignal);
        };
        let dx = self.rng.next_signed() * self.jitter_px;
        let dy = self.rng.next_signed() * self.jitter_px;
        Ok(Reading::Gaze {
            x: x + dx,
            y: y + dy,
        })
    }
}

/// Replays a recorded gaze trace against the clock: each poll returns the
/// latest row whose timestamp is not in the future.
pub struct TraceSource {
    rows: Vec<TraceRow>,
    cursor: usize,
    clock: DynClock,
    epoch: Instant,
}

impl TraceSource {
    pub fn new(rows: Vec<TraceRow>, clock: DynClock) -> Self {
        let epoch = clock.now();
        Self {
            rows,
            cursor: 0,
            clock,
            epoch,
        }
    }

    /// Timestamp of the final row, if any.
    pub fn end_ms(&self) -> Option<u64> {
        self.rows.last().map(|r| r.t_ms)
    }
}

impl SampleSource for TraceSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.clock.ms_since(self.epoch);
        let end = self.end_ms().unwrap_or(0);
        if self.rows.is_empty() || t > end {
            return Err(Box::new(SimError::TraceEnded(end)));
        }
        while self.cursor + 1 < self.rows.len() && self.rows[self.cursor + 1].t_ms <= t {
            self.cursor += 1;
        }
        let row = self.rows[self.cursor];
        if row.t_ms > t {
            // Before the first recorded row.
            return Ok(Reading::NoSignal);
        }
        tracing::trace!(t_ms = t, row = self.cursor, "trace sample");
        Ok(match row.point() {
            Some((x, y)) => Reading::Gaze { x, y },
            None => Reading::NoSignal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaze_traits::ManualClock;
    use std::time::Duration;

    #[test]
    fn scripted_source_repeats_last_step() {
        let mut src = ScriptedSource::hold(10.0, 20.0, 2).then([Step::NoSignal]);
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 10.0, y: 20.0 });
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 10.0, y: 20.0 });
        assert_eq!(src.poll().unwrap(), Reading::NoSignal);
        assert_eq!(src.poll().unwrap(), Reading::NoSignal);
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn scripted_fault_is_an_error() {
        let mut src = ScriptedSource::new([Step::Fault("camera busy".into())]);
        let err = src.poll().expect_err("fault");
        assert!(err.to_string().contains("camera busy"));
    }

    #[test]
    fn xorshift_stays_in_range() {
        let mut rng = XorShift::new(0);
        for _ in 0..10_000 {
            let v = rng.next_signed();
            assert!((-1.0..1.0).contains(&v));
        }
    }

    #[test]
    fn fixation_jitter_is_bounded() {
        let clock = ManualClock::new();
        let mut src = FixationSource::new(
            vec![(100.0, 100.0, 1000)],
            5.0,
            9,
            Arc::new(clock.clone()),
        );
        for _ in 0..50 {
            match src.poll().unwrap() {
                Reading::Gaze { x, y } => {
                    assert!((x - 100.0).abs() <= 5.0);
                    assert!((y - 100.0).abs() <= 5.0);
                }
                Reading::NoSignal => panic!("unexpected no-signal"),
            }
            clock.advance(Duration::from_millis(20));
        }
    }

    #[test]
    fn fixations_follow_clock_and_dropouts() {
        let clock = ManualClock::new();
        let mut src = FixationSource::new(
            vec![(10.0, 10.0, 500), (900.0, 10.0, 500)],
            0.0,
            1,
            Arc::new(clock.clone()),
        )
        .with_dropout(200, 100);
        assert_eq!(src.script_ms(), 1000);
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 10.0, y: 10.0 });
        clock.advance(Duration::from_millis(250));
        assert_eq!(src.poll().unwrap(), Reading::NoSignal);
        clock.advance(Duration::from_millis(350));
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 900.0, y: 10.0 });
        // Past the end the final fixation holds.
        clock.advance(Duration::from_secs(5));
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 900.0, y: 10.0 });
    }

    #[test]
    fn trace_source_follows_timestamps() {
        let clock = ManualClock::new();
        let rows = vec![
            TraceRow {
                t_ms: 0,
                x: Some(1.0),
                y: Some(1.0),
            },
            TraceRow {
                t_ms: 100,
                x: None,
                y: None,
            },
            TraceRow {
                t_ms: 200,
                x: Some(3.0),
                y: Some(3.0),
            },
        ];
        let mut src = TraceSource::new(rows, Arc::new(clock.clone()));
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 1.0, y: 1.0 });
        clock.advance(Duration::from_millis(150));
        assert_eq!(src.poll().unwrap(), Reading::NoSignal);
        clock.advance(Duration::from_millis(50));
        assert_eq!(src.poll().unwrap(), Reading::Gaze { x: 3.0, y: 3.0 });
        clock.advance(Duration::from_millis(1));
        let err = src.poll().expect_err("trace ended");
        assert!(err.downcast_ref::<SimError>().is_some());
    }
}
