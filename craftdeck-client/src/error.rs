use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Failed to acquire Spacelift credential: {0}")]
    CredentialAcquisition(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Application-level error reported by Spacelift. Only the first message of
    /// a multi-error response is kept.
    #[error("Spacelift API error: {0}")]
    Orchestrator(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}
