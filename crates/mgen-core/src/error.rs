//! Core error types for the MGEN konnector.
//!
//! This module defines the errors raised by the shared building blocks
//! (normalizers and configuration) and the user-visible [`ErrorKind`] that
//! every subsystem error maps onto.

use std::fmt;
use thiserror::Error;

/// User-visible classification of a failed run.
///
/// Subsystem errors carry more context; this is what the host reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The portal redirected to its maintenance page at login
    VendorDown,
    /// The portal rejected the credentials
    LoginFailed,
    /// An expected page element, link or form is missing
    StructureChanged,
    /// A currency value could not be parsed
    MalformedAmount,
    /// Transport-level failure (connection, TLS, HTTP status)
    Network,
    /// A storage collaborator failed
    Storage,
}

impl ErrorKind {
    /// Stable identifier, suitable for logs and exit messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VendorDown => "VENDOR_DOWN",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::StructureChanged => "STRUCTURE_CHANGED",
            Self::MalformedAmount => "MALFORMED_AMOUNT",
            Self::Network => "NETWORK",
            Self::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while normalizing portal text into typed values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Currency text has non-numeric residue after cleanup
    #[error("malformed amount: {0:?}")]
    MalformedAmount(String),

    /// Date text does not follow the DD/MM/YYYY convention
    #[error("malformed date: {0:?}")]
    MalformedDate(String),
}

impl NormalizeError {
    /// Map to the user-visible kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedAmount(_) => ErrorKind::MalformedAmount,
            Self::MalformedDate(_) => ErrorKind::StructureChanged,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required value is absent from both the file and the environment
    #[error("missing config value: {0}")]
    Missing(&'static str),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias for normalization.
pub type NormalizeResult<T> = std::result::Result<T, NormalizeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
