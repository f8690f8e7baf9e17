use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("no advisory API key")]
    MissingApiKey,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
