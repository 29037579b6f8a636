use craftdeck_client::ClientError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Message for any lookup of an unknown or unmanaged server
pub const SERVER_NOT_FOUND: &str = "Server not found";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ServiceError {
    pub fn server_not_found() -> Self {
        ServiceError::NotFound(SERVER_NOT_FOUND.to_string())
    }
}
