//! Maps `Box<dyn Error>` from the `SampleSource` boundary to typed `TrackerError`.
//!
//! The traits in `gaze_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum for logging.

use crate::error::TrackerError;

/// Map a predictor error to `TrackerError::Predictor`.
///
/// The message carries the whole `source()` chain, outermost first, joined
/// with `": "`.
pub fn map_source_error(e: &(dyn std::error::Error + 'static)) -> TrackerError {
    let mut msg = e.to_string();
    let mut cause = e.source();
    while let Some(inner) = cause {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        cause = inner.source();
    }
    TrackerError::Predictor(msg)
}
