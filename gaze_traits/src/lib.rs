pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// One answer from the gaze predictor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Predicted gaze position in screen pixels.
    Gaze { x: f64, y: f64 },
    /// The predictor ran but produced nothing (e.g. no face in frame).
    NoSignal,
}

/// External gaze predictor polled once per tick.
pub trait SampleSource {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>>;

    /// Whether the predictor capability exists at all. Checked once at
    /// construction; a source that reports `false` is never polled.
    fn available(&self) -> bool {
        true
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn poll(&mut self) -> Result<Reading, Box<dyn std::error::Error + Send + Sync>> {
        (**self).poll()
    }

    fn available(&self) -> bool {
        (**self).available()
    }
}

/// Axis-aligned screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Half-open containment: `[left, right) x [top, bottom)`.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Live bounds of a watched region. Queried every tick; regions may move.
pub trait BoundsProvider {
    fn rect(&self) -> Rect;
}

impl BoundsProvider for Rect {
    fn rect(&self) -> Rect {
        *self
    }
}

impl<F> BoundsProvider for F
where
    F: Fn() -> Rect,
{
    fn rect(&self) -> Rect {
        self()
    }
}
