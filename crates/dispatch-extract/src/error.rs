use thiserror::Error;

/// Reasons an extraction attempt did not produce a JSON object.
///
/// These never reach callers of [`crate::TranscriptExtractor`]; they become
/// the `reason` of a degraded extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("completion response is malformed: {0}")]
    MalformedResponse(String),

    #[error("response contained no message content")]
    EmptyContent,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is JSON but not an object")]
    NotAnObject,

    #[error("Configuration error: {0}")]
    Configuration(String),
}
