use mgen_core::{ErrorKind, NormalizeError};
use mgen_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("portal is under maintenance")]
    VendorDown,

    #[error("login failed: {message}")]
    LoginFailed { message: String },

    #[error("page structure changed on {page}: {reason}")]
    StructureChanged { page: &'static str, reason: String },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("session error: {0}")]
    Session(SessionError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl ScrapeError {
    pub fn structure(page: &'static str, reason: impl Into<String>) -> Self {
        Self::StructureChanged {
            page,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VendorDown => ErrorKind::VendorDown,
            Self::LoginFailed { .. } => ErrorKind::LoginFailed,
            Self::StructureChanged { .. } => ErrorKind::StructureChanged,
            Self::Normalize(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::Sink(_) => ErrorKind::Storage,
        }
    }
}

impl From<SessionError> for ScrapeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::VendorDown => Self::VendorDown,
            SessionError::LoginFailed { message } => Self::LoginFailed { message },
            SessionError::InvalidSelector { selector, reason } => Self::StructureChanged {
                page: "login",
                reason: format!("invalid selector {selector:?}: {reason}"),
            },
            other => Self::Session(other),
        }
    }
}

/// Failure reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("deadline passed before {0} could be stored")]
    DeadlineExceeded(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("download of {filename} failed: {source}")]
    Download {
        filename: String,
        #[source]
        source: SessionError,
    },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
