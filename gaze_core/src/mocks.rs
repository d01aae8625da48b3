//! Null and fixed sample sources for gaze_core

use gaze_traits::{Reading, SampleSource};

/// Stand-in for a machine with no gaze predictor. Reports itself unavailable,
/// so `init` fails with `PredictorUnavailable` instead of polling it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSource;

impl SampleSource for NullSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Reading::NoSignal)
    }

    fn available(&self) -> bool {
        false
    }
}

/// Always reports the same gaze point.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    pub x: f64,
    pub y: f64,
}

impl FixedSource {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl SampleSource for FixedSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Reading::Gaze {
            x: self.x,
            y: self.y,
        })
    }
}
