//! Membership certificate generation.

use crate::document::{previous_element, PortalDocument};
use crate::embedded::extract_quoted_urls;
use crate::error::Result;
use mgen_core::{FormFields, OutputFile, PortalConfig, PortalSelectors, ATTESTATION_FILENAME};
use mgen_session::{resolve_link, Transport};
use std::collections::BTreeMap;
use url::Url;

const PAGE: &str = "attestation";

/// Generation parameters: everyone on the contract, delivered as a download.
const GENERATION_FIELDS: [(&str, &str); 2] =
    [("identifiantPersonne", "0"), ("modeEnvoi", "telecharger")];

/// Endpoints declared by the certificate page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationEndpoints {
    /// Triggers server-side preparation of the document
    pub generate: Url,
    /// Serves the prepared document
    pub download: Url,
}

/// Asks the portal to prepare the certificate and describes how to fetch it.
pub struct AttestationFetcher<'a> {
    portal: &'a PortalConfig,
    selectors: &'a PortalSelectors,
}

impl<'a> AttestationFetcher<'a> {
    /// Create a fetcher for the configured portal.
    #[must_use]
    pub fn new(portal: &'a PortalConfig, selectors: &'a PortalSelectors) -> Self {
        Self { portal, selectors }
    }

    /// Generate the certificate behind `mutuelle_url`.
    ///
    /// Returns `Ok(None)` when the member has no certificate section.
    pub async fn fetch(
        &self,
        session: &dyn Transport,
        mutuelle_url: Option<&Url>,
    ) -> Result<Option<OutputFile>> {
        let Some(url) = mutuelle_url else {
            tracing::info!("No certificate section, skipping attestation");
            return Ok(None);
        };

        tracing::info!("Fetching attestation");
        let page = session.get(url).await?;
        let endpoints = self.endpoints(&page.body)?;
        tracing::debug!("Attestation endpoints: {:?}", endpoints);

        let fields: FormFields = GENERATION_FIELDS.into_iter().collect();
        // Only success matters; the body is a confirmation fragment.
        session.post_form(&endpoints.generate, &fields).await?;

        let headers = BTreeMap::from([(
            "User-Agent".to_string(),
            self.portal.download_user_agent.clone(),
        )]);
        Ok(Some(OutputFile {
            file_url: endpoints.download,
            filename: ATTESTATION_FILENAME.to_string(),
            headers,
        }))
    }

    /// Read the generate and download URLs from the inline script declared
    /// just before the certificate panel.
    pub fn endpoints(&self, html: &str) -> Result<AttestationEndpoints> {
        let doc = PortalDocument::parse(html, PAGE);
        let panel = doc.require(&self.selectors.attestation_panel, "certificate panel")?;
        let script = previous_element(panel)
            .filter(|el| el.value().name() == "script")
            .ok_or_else(|| doc.structure_error("no inline script before the certificate panel"))?;

        let script_text = script.text().collect::<String>();
        let urls = extract_quoted_urls(&script_text);
        let [generate, download, ..] = urls.as_slice() else {
            return Err(doc.structure_error(format!(
                "expected generate and download URLs, found {}",
                urls.len()
            )));
        };

        Ok(AttestationEndpoints {
            generate: resolve_link(&self.portal.base_url, generate)?,
            download: resolve_link(&self.portal.base_url, download)?,
        })
    }
}
