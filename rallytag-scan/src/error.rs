use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Core error: {0}")]
    Core(#[from] rallytag_core::CoreError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn camera(msg: impl Into<String>) -> Self {
        Self::CameraUnavailable(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
