use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("gaze predictor unavailable")]
    PredictorUnavailable,
    #[error("predictor error: {0}")]
    Predictor(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("region not found: {0}")]
    NotFound(String),
    #[error("tracker stopped")]
    Stopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sample source")]
    MissingSource,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
