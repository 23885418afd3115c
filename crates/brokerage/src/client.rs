//! Robinhood REST client.
//!
//! Three hosts serve the data the reports need: the main API for accounts,
//! positions and orders, phoenix for the unified account view, and nummus for
//! crypto. All requests after login carry a bearer token.
//!
//! # Example
//!
//! ```ignore
//! use folio_sync_brokerage::{RobinhoodClient, RobinhoodConfig};
//! use folio_sync_core::Brokerage;
//!
//! let client = RobinhoodClient::new(RobinhoodConfig::from(&app.brokerage))?;
//! client.login().await?;
//! let positions = client.stock_positions("5QR12345").await?;
//! ```

use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use folio_sync_core::{BrokerageConfig, BrokerageError};

use crate::types::Page;

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for [`RobinhoodClient`].
#[derive(Clone)]
pub struct RobinhoodConfig {
    pub api_url: String,
    pub phoenix_url: String,
    pub nummus_url: String,
    pub username: String,
    pub password: SecretString,
    pub client_id: String,
    pub expires_in_secs: u64,
    pub timeout_secs: u64,
    pub max_pages: usize,
}

impl std::fmt::Debug for RobinhoodConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodConfig")
            .field("api_url", &self.api_url)
            .field("phoenix_url", &self.phoenix_url)
            .field("nummus_url", &self.nummus_url)
            .field("username", &self.username)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl Default for RobinhoodConfig {
    fn default() -> Self {
        Self::from(&BrokerageConfig::default())
    }
}

impl From<&BrokerageConfig> for RobinhoodConfig {
    fn from(config: &BrokerageConfig) -> Self {
        Self {
            api_url: trim_url(&config.api_url),
            phoenix_url: trim_url(&config.phoenix_url),
            nummus_url: trim_url(&config.nummus_url),
            username: config.username.clone(),
            password: SecretString::from(config.password.clone()),
            client_id: config.client_id.clone(),
            expires_in_secs: config.expires_in_secs,
            timeout_secs: config.timeout_secs,
            max_pages: config.max_pages.max(1),
        }
    }
}

impl RobinhoodConfig {
    /// Points every host at one base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = trim_url(&url.into());
        self.api_url = url.clone();
        self.phoenix_url = url.clone();
        self.nummus_url = url;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Which Robinhood host a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Host {
    Api,
    Phoenix,
    Nummus,
}

// =============================================================================
// Client
// =============================================================================

/// Read-only Robinhood client implementing [`folio_sync_core::Brokerage`].
pub struct RobinhoodClient {
    pub(crate) config: RobinhoodConfig,
    pub(crate) http: Client,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for RobinhoodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodClient")
            .field("api_url", &self.config.api_url)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl RobinhoodClient {
    /// Creates an unauthenticated client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: RobinhoodConfig) -> Result<Self, BrokerageError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerageError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    /// Installs a session token without logging in.
    #[must_use]
    pub fn with_access_token(self, token: impl Into<String>) -> Self {
        self.set_token(token.into());
        self
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    pub(crate) fn set_token(&self, token: String) {
        *self.token.write() = Some(SecretString::from(token));
    }

    fn bearer(&self) -> Result<String, BrokerageError> {
        self.token
            .read()
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
            .ok_or_else(|| BrokerageError::Authentication("not logged in".to_string()))
    }

    pub(crate) fn url(&self, host: Host, path: &str) -> String {
        let base = match host {
            Host::Api => &self.config.api_url,
            Host::Phoenix => &self.config.phoenix_url,
            Host::Nummus => &self.config.nummus_url,
        };
        format!("{base}{path}")
    }

    /// Rejects identifiers that would escape their path segment.
    pub(crate) fn validate_identifier(id: &str) -> Result<&str, BrokerageError> {
        if id.is_empty() {
            return Err(BrokerageError::NotFound("empty identifier".to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(BrokerageError::NotFound(format!("invalid identifier: {id}")));
        }
        Ok(id)
    }

    /// Makes an authenticated GET request against a host-relative path.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        host: Host,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BrokerageError> {
        let url = self.url(host, path);
        self.get_url(&url, query).await
    }

    /// Makes an authenticated GET request against an absolute URL.
    pub(crate) async fn get_url<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BrokerageError> {
        let auth = self.bearer()?;
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .header("Authorization", auth)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }

    /// Follows `next` cursors until exhausted or `max_pages` is reached.
    pub(crate) async fn paginate<T: DeserializeOwned>(
        &self,
        host: Host,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, BrokerageError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 0..self.config.max_pages {
            let mut params: Vec<(&str, &str)> = query.to_vec();
            if let Some(c) = cursor.as_deref() {
                params.push(("cursor", c));
            }

            let page: Page<T> = self.get(host, path, &params).await?;
            items.extend(page.results);

            match page.next.as_deref().and_then(next_cursor) {
                Some(next) => cursor = Some(next),
                None => return Ok(items),
            }

            if page_number + 1 == self.config.max_pages {
                tracing::warn!(
                    path,
                    pages = self.config.max_pages,
                    "stopped following pagination at page limit"
                );
            }
        }

        Ok(items)
    }
}

/// Extracts the `cursor` query parameter from a `next` link.
pub(crate) fn next_cursor(next: &str) -> Option<String> {
    let url = url::Url::parse(next).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "cursor")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub(crate) fn transport_error(e: reqwest::Error) -> BrokerageError {
    if e.is_timeout() {
        BrokerageError::Timeout(e.to_string())
    } else if e.is_decode() {
        BrokerageError::Serialization(e.to_string())
    } else {
        BrokerageError::Network(e.to_string())
    }
}

/// Maps HTTP status codes onto [`BrokerageError`] and decodes successes.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BrokerageError> {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(BrokerageError::rate_limit(retry_after));
    }

    let text = response.text().await.map_err(transport_error)?;

    match status.as_u16() {
        200..=299 => serde_json::from_str(&text)
            .map_err(|e| BrokerageError::Serialization(format!("{e}: {}", truncate(&text)))),
        401 | 403 => Err(BrokerageError::Authentication(truncate(&text))),
        404 => Err(BrokerageError::NotFound(truncate(&text))),
        code => Err(BrokerageError::api(code, truncate(&text))),
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 300;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
