use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited by provider after {0} retries")]
    RateLimited(u32),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No listing API key configured")]
    MissingApiKey,
}

pub type ListingResult<T> = Result<T, ListingError>;
