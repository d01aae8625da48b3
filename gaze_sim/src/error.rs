use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("scripted predictor fault: {0}")]
    Fault(String),
    #[error("gaze trace exhausted at {0} ms")]
    TraceEnded(u64),
}

pub type Result<T> = std::result::Result<T, SimError>;
