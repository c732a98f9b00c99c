use mgen_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("portal is under maintenance")]
    VendorDown,

    #[error("login failed: {message}")]
    LoginFailed { message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid request header: {0}")]
    InvalidHeader(String),

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VendorDown => ErrorKind::VendorDown,
            Self::LoginFailed { .. } => ErrorKind::LoginFailed,
            Self::InvalidSelector { .. } => ErrorKind::StructureChanged,
            Self::Http(_)
            | Self::UnexpectedStatus { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidHeader(_) => ErrorKind::Network,
        }
    }
}
