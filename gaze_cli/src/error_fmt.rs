//! Human-readable error descriptions and structured JSON error formatting.

use gaze_core::error::{BuildError, TrackerError};

/// Stable machine name for the typed error inside `err`, if any.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => "MissingSource",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<TrackerError>() {
        Some(TrackerError::PredictorUnavailable) => "PredictorUnavailable",
        Some(TrackerError::Predictor(_)) => "Predictor",
        Some(TrackerError::InvalidArgument(_)) => "InvalidArgument",
        Some(TrackerError::NotFound(_)) => "NotFound",
        Some(TrackerError::Stopped) => "Stopped",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => {
                "What happened: No gaze source was provided to the tracker.\nLikely causes: The predictor failed to initialize or was not wired into the builder.\nHow to fix: Pass a source via with_source(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid tracker configuration ({msg}).\nLikely causes: Out-of-range values in the [tracker] table.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<TrackerError>() {
        return match te {
            TrackerError::PredictorUnavailable => {
                "What happened: No gaze predictor is available.\nLikely causes: The webcam or gaze model is not installed, or --no-predictor was given.\nHow to fix: Install a predictor, or fall back to another input mode.".to_string()
            }
            TrackerError::InvalidArgument(msg) => format!(
                "What happened: Invalid input ({msg}).\nLikely causes: A malformed config or trace file, or a duplicate region id.\nHow to fix: Fix the file named above and rerun."
            ),
            TrackerError::NotFound(id) => format!(
                "What happened: No region is registered under '{id}'.\nLikely causes: The region was already removed or never watched.\nHow to fix: Check the region id."
            ),
            TrackerError::Stopped => {
                "What happened: The tracker was already stopped.\nLikely causes: A call after stop().\nHow to fix: Build a new tracker.".to_string()
            }
            TrackerError::Predictor(_) => format!(
                "What happened: {te}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong path or missing permissions.\nHow to fix: Check the --config argument. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes: 1 generic, 2 invalid input, 3 no predictor.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<TrackerError>() {
        Some(TrackerError::PredictorUnavailable) => 3,
        Some(TrackerError::InvalidArgument(_) | TrackerError::NotFound(_)) => 2,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
