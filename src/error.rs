use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Server already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("Server is not running")]
    NotRunning,

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}
