//! Storage collaborators the pipeline hands its results to.
//!
//! The pipeline never writes anything itself. A host provides a
//! [`BillSink`] for the enriched entries and a [`FileSink`] for the
//! documents, and [`deliver`] feeds both from a [`RunReport`].

use crate::error::{Result, SinkError};
use crate::pipeline::RunReport;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mgen_core::{OutputFile, ReimbursementEntry, VENDOR};
use std::path::Path;

/// Options passed along with a batch of bills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillOptions {
    /// Instant after which the sink must refuse to write
    pub deadline: DateTime<Utc>,
    /// Identifier used to match bills with bank operations
    pub identifier: String,
}

impl BillOptions {
    /// Options with a deadline `budget_secs` from now.
    #[must_use]
    pub fn with_budget(budget_secs: u64) -> Self {
        let deadline = i64::try_from(budget_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|budget| Utc::now().checked_add_signed(budget))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            deadline,
            identifier: VENDOR.to_string(),
        }
    }

    /// True once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.deadline
    }
}

/// Persists enriched entries.
#[async_trait]
pub trait BillSink: Send + Sync {
    /// Store `entries` under `folder`; returns how many were newly stored.
    async fn save_bills(
        &self,
        entries: &[ReimbursementEntry],
        folder: &Path,
        options: &BillOptions,
    ) -> std::result::Result<usize, SinkError>;
}

/// Fetches and stores documents.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Store `files` under `folder`; returns how many were newly stored.
    async fn save_files(
        &self,
        files: &[OutputFile],
        folder: &Path,
    ) -> std::result::Result<usize, SinkError>;
}

/// What the sinks reported storing.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Documents newly stored
    pub files_saved: usize,
    /// Entries newly stored
    pub bills_saved: usize,
    /// First document that could not be stored; the entries were still saved
    pub files_error: Option<SinkError>,
}

/// Hand a run's documents, then its entries, to the sinks.
///
/// A file sink failure does not keep the entries from being stored; it is
/// reported in [`Delivery::files_error`]. A bill sink failure is returned.
pub async fn deliver(
    report: &RunReport,
    bills: &dyn BillSink,
    files: &dyn FileSink,
    folder: &Path,
    options: &BillOptions,
) -> Result<Delivery> {
    let documents = report.output_files();
    let (files_saved, files_error) = match files.save_files(&documents, folder).await {
        Ok(saved) => {
            tracing::info!("Saved {} of {} files", saved, documents.len());
            (saved, None)
        }
        Err(error) => {
            tracing::warn!("Could not store every file: {}", error);
            (0, Some(error))
        }
    };

    let bills_saved = bills.save_bills(&report.entries, folder, options).await?;
    tracing::info!("Saved {} of {} bills", bills_saved, report.entries.len());

    Ok(Delivery {
        files_saved,
        bills_saved,
        files_error,
    })
}
