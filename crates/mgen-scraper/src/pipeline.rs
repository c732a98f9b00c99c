//! End-to-end run: login, section discovery, then the certificate and
//! reimbursement paths side by side.

use crate::attestation::AttestationFetcher;
use crate::enricher::{DetailEnricher, RowFailure};
use crate::error::{Result, ScrapeError};
use crate::reimbursements::{table_position, ReimbursementExtractor};
use crate::sections::SectionLocator;
use mgen_core::{AppConfig, Credentials, OutputFile, ReimbursementEntry};
use mgen_session::{SessionAuthenticator, Transport};
use std::sync::Arc;
use url::Url;

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Enriched entries, in result table order
    pub entries: Vec<ReimbursementEntry>,
    /// Certificate to download, when the member has one
    pub attestation: Option<OutputFile>,
    /// Why the certificate could not be generated
    pub attestation_error: Option<ScrapeError>,
    /// Rows left out, from table parsing or detail enrichment
    pub row_failures: Vec<RowFailure>,
}

impl RunReport {
    /// Documents for the file sink: the certificate first, then each
    /// entry's statement.
    #[must_use]
    pub fn output_files(&self) -> Vec<OutputFile> {
        self.attestation
            .iter()
            .cloned()
            .chain(self.entries.iter().filter_map(ReimbursementEntry::output_file))
            .collect()
    }

    /// True when no row was left out and the certificate path succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.row_failures.is_empty() && self.attestation_error.is_none()
    }
}

/// Sequences one run against the portal.
///
/// The session is fresh at the start of [`Pipeline::run`] and is not meant
/// to outlive it.
pub struct Pipeline {
    config: AppConfig,
    session: Arc<dyn Transport>,
}

impl Pipeline {
    /// Create a pipeline over an unauthenticated session.
    #[must_use]
    pub fn new(config: AppConfig, session: Arc<dyn Transport>) -> Self {
        Self { config, session }
    }

    /// Log in and collect entries and the certificate.
    ///
    /// Login, section discovery and search failures abort the run. The
    /// certificate and reimbursement paths run to completion independently:
    /// a certificate failure lands in [`RunReport::attestation_error`], and a
    /// row that cannot be read or enriched is reported in
    /// [`RunReport::row_failures`] while the other rows carry on.
    pub async fn run(&self, credentials: &Credentials) -> Result<RunReport> {
        let authenticated =
            SessionAuthenticator::new(&self.config.portal, &self.config.selectors)
                .authenticate(Arc::clone(&self.session), credentials)
                .await?;
        let session = authenticated.session.as_ref();

        let sections = SectionLocator::new(&self.config.portal, &self.config.selectors)
            .locate(&authenticated.landing.body)?;

        let attestation = AttestationFetcher::new(&self.config.portal, &self.config.selectors);
        let (attestation, reimbursements) = tokio::join!(
            attestation.fetch(session, sections.mutuelle_url.as_ref()),
            self.reimbursements(session, &sections.reimbursements_url),
        );
        let (entries, row_failures) = reimbursements?;
        let (attestation, attestation_error) = match attestation {
            Ok(attestation) => (attestation, None),
            Err(error) => {
                tracing::warn!("Could not generate the certificate: {}", error);
                (None, Some(error))
            }
        };

        tracing::info!(
            "Run finished: {} entries, {} rows left out, certificate {}",
            entries.len(),
            row_failures.len(),
            match (&attestation, &attestation_error) {
                (Some(_), _) => "found",
                (None, Some(_)) => "failed",
                (None, None) => "absent",
            }
        );

        Ok(RunReport {
            entries,
            attestation,
            attestation_error,
            row_failures,
        })
    }

    async fn reimbursements(
        &self,
        session: &dyn Transport,
        url: &Url,
    ) -> Result<(Vec<ReimbursementEntry>, Vec<RowFailure>)> {
        let page = ReimbursementExtractor::new(&self.config)
            .extract(session, url)
            .await?;

        let Some(form) = page.detail_form else {
            return Ok((Vec::new(), page.rejected));
        };

        let report = DetailEnricher::new(&self.config)
            .enrich(session, &form, &page.row_order, page.entries)
            .await;

        let mut failures = page.rejected;
        let enrichment_failures: Vec<RowFailure> = report
            .failures
            .into_iter()
            .map(|mut failure| {
                failure.position = table_position(&failures, failure.position);
                failure
            })
            .collect();
        failures.extend(enrichment_failures);
        failures.sort_by_key(|failure| failure.position);
        Ok((report.entries, failures))
    }
}
