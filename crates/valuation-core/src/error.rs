use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Model not fitted: {0}")]
    NotFitted(&'static str),

    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ValuationError {
    fn from(err: std::io::Error) -> Self {
        ValuationError::Persistence(err.to_string())
    }
}
