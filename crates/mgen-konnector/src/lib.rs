//! MGEN Konnector host shell
//!
//! Loads configuration and credentials, runs the scraping pipeline over a
//! live portal session and stores the results. Extraction logic lives in
//! the `mgen-*` crates.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod bills;
pub mod files;

pub use bills::JsonBillStore;
pub use files::DownloadFileSink;

use anyhow::Context;
use mgen_core::{AppConfig, Credentials};
use mgen_scraper::{deliver, BillOptions, Delivery, Pipeline, RunReport, ScrapeError};
use mgen_session::{HttpSession, Transport};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a run produced and what was stored.
#[derive(Debug)]
pub struct Outcome {
    pub report: RunReport,
    pub delivery: Delivery,
}

impl Outcome {
    /// True when every row, the certificate and every file made it to storage.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.report.is_complete() && self.delivery.files_error.is_none()
    }
}

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mgen=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Run the pipeline over `session` and store what it found.
pub async fn execute(
    config: AppConfig,
    credentials: &Credentials,
    session: Arc<dyn Transport>,
) -> anyhow::Result<Outcome> {
    let bills = JsonBillStore::new(config.output.bills_file.clone());
    let files = DownloadFileSink::new(Arc::clone(&session));
    let budget = config.output.bills_deadline_secs;

    let report = Pipeline::new(config, session).run(credentials).await?;
    for failure in &report.row_failures {
        warn!(
            "Row {} ({}) left out: {}",
            failure.position + 1,
            failure
                .row_index
                .as_ref()
                .map_or("unreadable", |index| index.as_str()),
            failure.error
        );
    }

    let delivery = deliver(
        &report,
        &bills,
        &files,
        &credentials.output_directory,
        &BillOptions::with_budget(budget),
    )
    .await?;

    Ok(Outcome { report, delivery })
}

/// Entry point of the binary.
pub async fn run() -> ExitCode {
    init_tracing();
    info!("Starting mgen-konnector v{}", env!("CARGO_PKG_VERSION"));

    match start().await {
        Ok(outcome) if outcome.is_complete() => {
            info!(
                "Done: {} bills and {} files stored",
                outcome.delivery.bills_saved, outcome.delivery.files_saved
            );
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            warn!(
                "Done with {} rows left out, {} bills and {} files stored",
                outcome.report.row_failures.len(),
                outcome.delivery.bills_saved,
                outcome.delivery.files_saved
            );
            if let Some(err) = &outcome.report.attestation_error {
                error!("{}: certificate: {}", err.kind(), err);
            }
            if let Some(err) = &outcome.delivery.files_error {
                error!("storage: {}", err);
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            match err.downcast_ref::<ScrapeError>() {
                Some(scrape) => error!("{}: {:#}", scrape.kind(), err),
                None => error!("{:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn start() -> anyhow::Result<Outcome> {
    let config = AppConfig::load_with_env().context("loading configuration")?;
    let credentials = config.credentials().context("reading credentials")?;
    let session = HttpSession::new(&config.portal).context("creating HTTP session")?;

    execute(config, &credentials, Arc::new(session)).await
}
