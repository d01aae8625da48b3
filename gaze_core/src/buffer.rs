//! Rolling smoothing window over raw gaze samples.
//!
//! Fixed capacity, FIFO eviction. The stable point is the arithmetic mean of
//! the window; stability is judged from the population standard deviation
//! on each axis.
use std::collections::VecDeque;

/// Fewer samples than this never produce a stable point.
pub const MIN_SAMPLES: usize = 3;

/// One raw prediction, stamped with the tracker's clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
}

/// Smoothed gaze estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableGazePoint {
    pub x: f64,
    pub y: f64,
    /// True when both per-axis standard deviations are below the threshold.
    pub stable: bool,
}

impl StableGazePoint {
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    samples: VecDeque<GazeSample>,
    capacity: usize,
    threshold_px: f64,
}

impl SmoothingBuffer {
    pub fn new(capacity: usize, threshold_px: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            threshold_px,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: GazeSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the window plus a stability verdict. `None` below `MIN_SAMPLES`.
    pub fn compute_stable(&self) -> Option<StableGazePoint> {
        if self.samples.len() < MIN_SAMPLES {
            return None;
        }
        let n = self.samples.len() as f64;
        let (sum_x, sum_y) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(sx, sy), s| (sx + s.x, sy + s.y));
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;
        let (var_x, var_y) = self.samples.iter().fold((0.0, 0.0), |(vx, vy), s| {
            let dx = s.x - mean_x;
            let dy = s.y - mean_y;
            (vx + dx * dx, vy + dy * dy)
        });
        let std_x = (var_x / n).sqrt();
        let std_y = (var_y / n).sqrt();

        Some(StableGazePoint {
            x: mean_x,
            y: mean_y,
            stable: std_x.max(std_y) < self.threshold_px,
        })
    }

    pub fn latest(&self) -> Option<&GazeSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
