use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Match creation failed: {0}")]
    CreationFailed(String),

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Already counted as a participant of this match")]
    AlreadyJoined,

    #[error("Match already has its full set of participants")]
    MatchFull,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn creation_failed(msg: impl Into<String>) -> Self {
        Self::CreationFailed(msg.into())
    }

    pub fn match_not_found(id: impl Into<String>) -> Self {
        Self::MatchNotFound(id.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
