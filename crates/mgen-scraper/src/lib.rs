//! MGEN Scraper - reimbursement and certificate extraction.
//!
//! Drives an authenticated portal session through section discovery, the
//! reimbursement search, per-row detail enrichment and certificate
//! generation, and hands the results to storage collaborators.
//!
//! # Features
//!
//! - Matrix-qualified section URLs discovered on the landing page
//! - Search window computed from the form's own end date
//! - Detail enrichment through a bounded pool, results kept in table order
//! - Row-level failure isolation
//! - Certificate and reimbursement paths run concurrently
//!
//! # Example
//!
//! ```rust,ignore
//! use mgen_core::AppConfig;
//! use mgen_scraper::Pipeline;
//! use mgen_session::HttpSession;
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_with_env()?;
//! let credentials = config.credentials()?;
//! let session = Arc::new(HttpSession::new(&config.portal)?);
//!
//! let report = Pipeline::new(config, session).run(&credentials).await?;
//! println!("{} reimbursements", report.entries.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod attestation;
pub mod document;
#[allow(missing_docs)]
pub mod embedded;
#[allow(missing_docs)]
pub mod enricher;
#[allow(missing_docs)]
pub mod error;
pub mod pipeline;
#[allow(missing_docs)]
pub mod reimbursements;
#[allow(missing_docs)]
pub mod sections;
pub mod sink;

// Re-export commonly used types
pub use attestation::{AttestationEndpoints, AttestationFetcher};
pub use enricher::{DetailEnricher, EnrichmentReport, RowFailure};
pub use error::{Result, ScrapeError, SinkError};
pub use pipeline::{Pipeline, RunReport};
pub use reimbursements::{PreparedForm, ReimbursementExtractor, ReimbursementPage};
pub use sections::SectionLocator;
pub use sink::{deliver, BillOptions, BillSink, Delivery, FileSink};
