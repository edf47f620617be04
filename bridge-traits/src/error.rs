use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Host surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Invalid argument `{name}`: {message}")]
    InvalidArgument { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
