use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Error fetching logs: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid log payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ViewerError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        ViewerError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }
}
