//! Feature URL discovery on the member landing page.

use crate::document::{closest_with_attr, PortalDocument};
use crate::error::{Result, ScrapeError};
use mgen_core::{PortalConfig, PortalSelectors, SectionUrls};
use mgen_session::resolve_link;
use url::Url;

const PAGE: &str = "landing";

/// Finds the certificate and reimbursement links and qualifies them with
/// their matrix codes.
pub struct SectionLocator<'a> {
    portal: &'a PortalConfig,
    selectors: &'a PortalSelectors,
}

impl<'a> SectionLocator<'a> {
    #[must_use]
    pub fn new(portal: &'a PortalConfig, selectors: &'a PortalSelectors) -> Self {
        Self { portal, selectors }
    }

    /// Discover the section URLs in the landing page body.
    ///
    /// A member without complementary coverage has no certificate link;
    /// that yields `mutuelle_url: None`. The reimbursement link must exist.
    pub fn locate(&self, landing_html: &str) -> Result<SectionUrls> {
        tracing::info!("Getting sections urls");
        let doc = PortalDocument::parse(landing_html, PAGE);

        let mutuelle_url = self.section_url(
            &doc,
            &self.selectors.attestation_link,
            &self.selectors.attestation_scope_attr,
        )?;
        if mutuelle_url.is_none() {
            tracing::info!("No complementary coverage certificate link");
        }

        let reimbursements_url = self
            .section_url(
                &doc,
                &self.selectors.reimbursements_link,
                &self.selectors.reimbursements_scope_attr,
            )?
            .ok_or_else(|| {
                doc.structure_error(format!(
                    "reimbursements link not found ({})",
                    self.selectors.reimbursements_link
                ))
            })?;

        let sections = SectionUrls {
            mutuelle_url,
            reimbursements_url,
        };
        tracing::debug!("Sections urls: {:?}", sections);
        Ok(sections)
    }

    fn section_url(
        &self,
        doc: &PortalDocument,
        link_selector: &str,
        scope_attr: &str,
    ) -> Result<Option<Url>> {
        let Some(link) = doc.find(link_selector)? else {
            return Ok(None);
        };

        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| doc.structure_error(format!("{link_selector} has no href")))?;

        let matrix = closest_with_attr(link, scope_attr)
            .and_then(|scope| scope.value().attr(&self.selectors.matrix_attr))
            .ok_or_else(|| {
                doc.structure_error(format!(
                    "no {} on [{scope_attr}] around {link_selector}",
                    self.selectors.matrix_attr
                ))
            })?;

        let url = resolve_link(
            &self.portal.base_url,
            &format!("{href}&codeMatrice={matrix}"),
        )
        .map_err(ScrapeError::from)?;
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r#"
        <div class="tuiles">
            <div data-tag-metier-attestations-demarches="1" data-matrice="ATT42">
                <a href="/mon-espace-perso/attestation-de-droit-regime-complementaire/?tx%5Bid%5D=7">Attestation</a>
            </div>
            <div data-tag-metier-remboursements="1" data-matrice="RMB99">
                <p><a href="/mon-espace-perso/mes-remboursements/?tx%5Bpage%5D=1">Mes remboursements</a></p>
            </div>
        </div>
    "#;

    fn locate(html: &str) -> Result<SectionUrls> {
        let portal = PortalConfig::default();
        let selectors = PortalSelectors::default();
        SectionLocator::new(&portal, &selectors).locate(html)
    }

    #[test]
    fn test_locates_both_sections() {
        let sections = locate(LANDING).expect("locate sections");
        let mutuelle = sections.mutuelle_url.expect("certificate url");
        assert_eq!(
            mutuelle.as_str(),
            "https://www.mgen.fr/mon-espace-perso/attestation-de-droit-regime-complementaire/?tx[id]=7&codeMatrice=ATT42"
        );
        assert_eq!(
            sections.reimbursements_url.as_str(),
            "https://www.mgen.fr/mon-espace-perso/mes-remboursements/?tx[page]=1&codeMatrice=RMB99"
        );
    }

    #[test]
    fn test_missing_certificate_is_not_an_error() {
        let html = r#"
            <div data-tag-metier-remboursements="1" data-matrice="RMB99">
                <a href="/mes-remboursements/?p=1">Mes remboursements</a>
            </div>"#;
        let sections = locate(html).expect("locate sections");
        assert!(sections.mutuelle_url.is_none());
        assert_eq!(
            sections.reimbursements_url.query(),
            Some("p=1&codeMatrice=RMB99")
        );
    }

    #[test]
    fn test_missing_reimbursements_is_structure_change() {
        let html = r#"<div data-matrice="X"><a href="/ailleurs/">Autre</a></div>"#;
        assert!(matches!(
            locate(html),
            Err(ScrapeError::StructureChanged { page: "landing", .. })
        ));
    }

    #[test]
    fn test_missing_matrix_code_is_structure_change() {
        let html = r#"<div><a href="/mes-remboursements/?p=1">Mes remboursements</a></div>"#;
        let err = locate(html).unwrap_err();
        assert!(err.to_string().contains("data-matrice"));
    }
}
