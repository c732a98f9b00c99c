//! HTTP transport seam and the cookie-bearing portal session.

use crate::error::{Result, SessionError};
use async_trait::async_trait;
use mgen_core::{FormFields, PortalConfig};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// A fetched HTML page and the URL it finally resolved to.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects
    pub url: Url,
    /// Response body
    pub body: String,
}

/// Requests the pipeline issues against the portal.
///
/// Implementations must be thread-safe (Send + Sync): detail enrichment
/// issues several requests at once through the same session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a page.
    async fn get(&self, url: &Url) -> Result<Page>;

    /// Submit a form-encoded POST and return the resulting page.
    async fn post_form(&self, url: &Url, fields: &FormFields) -> Result<Page>;

    /// Fetch raw bytes, sending the given extra headers.
    async fn download(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<Vec<u8>>;
}

/// Portal session backed by a `reqwest` client with a shared cookie jar.
///
/// The jar sits behind its own lock: cookies set by any response are stored
/// before the response is handed back, and every request made afterwards,
/// concurrent ones included, sends the updated jar.
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    /// Create a fresh, unauthenticated session.
    pub fn new(portal: &PortalConfig) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(cookies)
            .user_agent(portal.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(SessionError::UnexpectedStatus {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn read_page(response: Response) -> Result<Page> {
        let response = Self::check_status(response)?;
        let url = response.url().clone();
        let body = response.text().await?;
        tracing::trace!("Fetched {} ({} bytes)", url, body.len());
        Ok(Page { url, body })
    }

    fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| SessionError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| SessionError::InvalidHeader(name.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for HttpSession {
    async fn get(&self, url: &Url) -> Result<Page> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        Self::read_page(response).await
    }

    async fn post_form(&self, url: &Url, fields: &FormFields) -> Result<Page> {
        tracing::debug!("POST {} ({} fields)", url, fields.len());
        let response = self
            .client
            .post(url.clone())
            .form(fields.pairs())
            .send()
            .await?;
        Self::read_page(response).await
    }

    async fn download(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        tracing::debug!("Downloading {}", url);
        let response = self
            .client
            .get(url.clone())
            .headers(Self::header_map(headers)?)
            .send()
            .await?;
        let response = Self::check_status(response)?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Resolve a portal link against the base URL.
///
/// Links are percent-unescaped first, since the portal escapes the
/// query strings of some `href`s. Absolute links are kept as they are.
pub fn resolve_link(base_url: &str, href: &str) -> Result<Url> {
    let unescaped =
        urlencoding::decode(href).map_or_else(|_| href.to_string(), std::borrow::Cow::into_owned);
    let joined = if unescaped.starts_with("http://") || unescaped.starts_with("https://") {
        unescaped
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), unescaped)
    };

    Url::parse(&joined).map_err(|e| SessionError::InvalidUrl {
        url: joined.clone(),
        reason: e.to_string(),
    })
}
