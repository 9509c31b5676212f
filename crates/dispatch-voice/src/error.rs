use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
