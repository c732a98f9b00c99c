//! MGEN Core - Foundation crate for the MGEN member-portal konnector.
//!
//! This crate provides the shared data model, locale normalization,
//! error kinds and configuration that the session, scraper and host crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Error kinds and normalization/config errors using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`locale`] - French currency and `DD/MM/YYYY` date normalization
//! - [`types`] - Entries, detail records, output files and form payloads
//!
//! # Example
//!
//! ```rust
//! use mgen_core::{locale::normalize_amount, AppConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scraping.detail_concurrency, 5);
//!
//! assert_eq!(normalize_amount("1 234,56 €")?, 1234.56);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod locale;
pub mod types;

// Re-export commonly used types
pub use config::{
    AccountConfig, AppConfig, Credentials, DetailLabels, DetailStrategy, OutputConfig,
    PortalConfig, PortalSelectors, ScrapingConfig,
};
pub use error::{ConfigError, ConfigResult, ErrorKind, NormalizeError, NormalizeResult};
pub use types::{
    BillType, DetailRecord, EntryFile, FormFields, OutputFile, PreliminaryEntry,
    ReimbursementEntry, RowIndex, SectionUrls, ATTESTATION_FILENAME, VENDOR,
};
