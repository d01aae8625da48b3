//! `From` implementations bridging `gaze_config` types to `gaze_core` types.

use gaze_traits::Rect;

use crate::config::TrackerCfg;

impl From<&gaze_config::TrackerSection> for TrackerCfg {
    fn from(c: &gaze_config::TrackerSection) -> Self {
        Self {
            buffer_capacity: c.buffer_capacity,
            stability_threshold_px: c.stability_threshold_px,
            poll_interval_ms: c.poll_interval_ms,
            max_consecutive_failures: c.max_consecutive_failures,
        }
    }
}

/// Screen bounds of a configured region. A free function because both
/// `Rect` and `RegionCfg` live outside this crate.
pub fn region_bounds(c: &gaze_config::RegionCfg) -> Rect {
    Rect::new(c.left, c.top, c.right, c.bottom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_defaults_match_runtime_defaults() {
        let section = gaze_config::TrackerSection::default();
        assert_eq!(TrackerCfg::from(&section), TrackerCfg::default());
    }

    #[test]
    fn region_bounds_keep_edges() {
        let r = gaze_config::RegionCfg {
            id: "a".into(),
            left: 1.0,
            top: 2.0,
            right: 3.0,
            bottom: 4.0,
            dwell_ms: 10,
        };
        assert_eq!(region_bounds(&r), Rect::new(1.0, 2.0, 3.0, 4.0));
    }
}
