//! Portal login.

use crate::error::{Result, SessionError};
use crate::transport::{resolve_link, Page, Transport};
use mgen_core::{Credentials, FormFields, PortalConfig, PortalSelectors};
use scraper::{Html, Selector};
use std::sync::Arc;

/// A logged-in session and the landing page the login redirected to.
pub struct AuthenticatedSession {
    /// Session to issue every further request through
    pub session: Arc<dyn Transport>,
    /// Member landing page
    pub landing: Page,
}

/// Submits the member credentials and classifies the outcome.
///
/// A single attempt is made; there is no retry.
pub struct SessionAuthenticator<'a> {
    portal: &'a PortalConfig,
    selectors: &'a PortalSelectors,
}

impl<'a> SessionAuthenticator<'a> {
    /// Create an authenticator for the configured portal.
    #[must_use]
    pub fn new(portal: &'a PortalConfig, selectors: &'a PortalSelectors) -> Self {
        Self { portal, selectors }
    }

    /// Log in through `session`.
    ///
    /// # Errors
    /// - [`SessionError::VendorDown`] when the portal redirects to its maintenance page
    /// - [`SessionError::LoginFailed`] when the login panel is rendered again
    pub async fn authenticate(
        &self,
        session: Arc<dyn Transport>,
        credentials: &Credentials,
    ) -> Result<AuthenticatedSession> {
        tracing::info!("Logging in");

        let login_url = resolve_link(&self.portal.base_url, &self.portal.login_path)?;
        let mut fields = FormFields::new();
        fields.push("typeConnexion", "adherent");
        fields.push("user", credentials.login.as_str());
        fields.push("pass", credentials.password.as_str());
        fields.push("logintype", "login");
        fields.push("redirect_url", self.portal.redirect_path.as_str());

        let landing = session.post_form(&login_url, &fields).await?;
        self.inspect(&landing)?;

        tracing::info!("Successfully logged in");
        Ok(AuthenticatedSession { session, landing })
    }

    /// Classify the page the login POST resolved to.
    pub fn inspect(&self, page: &Page) -> Result<()> {
        if page.url.path() == self.portal.maintenance_path {
            tracing::warn!("Portal redirected to {}", page.url.path());
            return Err(SessionError::VendorDown);
        }

        let document = Html::parse_document(&page.body);
        let panel = parse_selector(&self.selectors.login_panel)?;
        if document.select(&panel).next().is_none() {
            return Ok(());
        }

        let error = parse_selector(&self.selectors.login_error)?;
        let message = document
            .select(&error)
            .map(|el| el.text().collect::<String>())
            .collect::<String>()
            .trim()
            .to_string();

        tracing::error!("{}", message);
        Err(SessionError::LoginFailed { message })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| SessionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(url: &str, body: &str) -> Page {
        Page {
            url: Url::parse(url).unwrap(),
            body: body.to_string(),
        }
    }

    fn authenticator_parts() -> (PortalConfig, PortalSelectors) {
        (PortalConfig::default(), PortalSelectors::default())
    }

    #[test]
    fn test_maintenance_redirect_is_vendor_down() {
        let (portal, selectors) = authenticator_parts();
        let auth = SessionAuthenticator::new(&portal, &selectors);
        let result = auth.inspect(&page(
            "https://www.mgen.fr/services-indisponibles/",
            "<html><body>Maintenance</body></html>",
        ));
        assert!(matches!(result, Err(SessionError::VendorDown)));
    }

    #[test]
    fn test_login_panel_is_login_failed() {
        let (portal, selectors) = authenticator_parts();
        let auth = SessionAuthenticator::new(&portal, &selectors);
        let body = r#"
            <div class="tx-felogin-pi1">
                <div class="alert alert-danger">
                    Identifiant ou mot de passe incorrect
                </div>
                <form></form>
            </div>
        "#;
        let result = auth.inspect(&page("https://www.mgen.fr/login-adherent/", body));
        match result {
            Err(SessionError::LoginFailed { message }) => {
                assert_eq!(message, "Identifiant ou mot de passe incorrect");
            }
            other => panic!("expected LoginFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_landing_page_passes() {
        let (portal, selectors) = authenticator_parts();
        let auth = SessionAuthenticator::new(&portal, &selectors);
        let body = r#"<div class="espace-perso"><a href="/mes-remboursements/">Remboursements</a></div>"#;
        assert!(auth
            .inspect(&page("https://www.mgen.fr/mon-espace-perso/", body))
            .is_ok());
    }
}
