//! Service-account authentication for the Google APIs.
//!
//! A signed RS256 JWT assertion is exchanged for a short-lived bearer token,
//! which is cached until shortly before it expires.
//!
//! # Example
//!
//! ```ignore
//! use folio_sync_sheets::ServiceAccountAuth;
//!
//! let auth = ServiceAccountAuth::from_file("credentials.json")?;
//! let token = auth.access_token(&http).await?;
//! ```

use std::path::Path;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use folio_sync_core::SheetError;

/// OAuth scopes needed to find a spreadsheet by name and edit it.
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";

/// Google's token endpoint, used when the key file omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a downloaded service-account key file that signing needs.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: SecretString,
    pub private_key_id: Option<String>,
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct RawKeyFile {
    #[serde(default)]
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Reads a key file from disk.
    ///
    /// # Errors
    /// Returns [`SheetError::Credentials`] if the file is missing or malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SheetError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parses key file contents.
    ///
    /// # Errors
    /// Returns [`SheetError::Credentials`] if required fields are absent.
    pub fn from_json(raw: &str) -> Result<Self, SheetError> {
        let raw: RawKeyFile = serde_json::from_str(raw)
            .map_err(|e| SheetError::Credentials(format!("invalid service account key: {e}")))?;
        if raw.client_email.trim().is_empty() {
            return Err(SheetError::Credentials("client_email is empty".to_string()));
        }
        Ok(Self {
            client_email: raw.client_email,
            private_key: SecretString::from(raw.private_key),
            private_key_id: raw.private_key_id,
            token_uri: raw.token_uri,
        })
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CachedToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

/// Signs assertions and caches the bearer token they buy.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    private_key: RsaPrivateKey,
    token_uri: String,
    cached: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    /// # Errors
    /// Returns [`SheetError::Credentials`] if the private key cannot be parsed.
    pub fn new(key: ServiceAccountKey) -> Result<Self, SheetError> {
        let pem = key.private_key.expose_secret().replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| SheetError::Credentials(format!("failed to parse private key: {e}")))?;
        let token_uri = key
            .token_uri
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            key,
            private_key,
            token_uri,
            cached: RwLock::new(None),
        })
    }

    /// # Errors
    /// Returns [`SheetError::Credentials`] if the file cannot be used.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        Self::new(ServiceAccountKey::from_file(path)?)
    }

    /// Overrides the token endpoint.
    #[must_use]
    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = uri.into();
        self
    }

    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Builds a signed JWT assertion issued at `issued_at` (unix seconds).
    ///
    /// # Errors
    /// Returns [`SheetError::Serialization`] if the header or claims fail to encode.
    pub fn assertion_at(&self, issued_at: i64) -> Result<String, SheetError> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.key.private_key_id.as_deref(),
        };
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        let signing_input = format!("{}.{}", segment(&header)?, segment(&claims)?);

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key.sign(signing_input.as_bytes());

        Ok(format!("{signing_input}.{}", BASE64URL.encode(signature.to_bytes())))
    }

    /// Returns a valid bearer token, exchanging a fresh assertion if needed.
    ///
    /// # Errors
    /// Returns [`SheetError::Authentication`] if the exchange is rejected.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, SheetError> {
        let now = Utc::now();
        if let Some(token) = self.cached.read().as_ref() {
            if token.expires_at > now + Duration::seconds(EXPIRY_MARGIN_SECS) {
                return Ok(token.value.expose_secret().to_string());
            }
        }

        let assertion = self.assertion_at(now.timestamp())?;
        tracing::debug!(client_email = %self.key.client_email, "exchanging service account assertion");

        let response = http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SheetError::Network(e.to_string()))?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetError::Authentication(format!("token response ({status}): {e}")))?;

        let access = match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) if status.is_success() => token,
            _ => {
                let reason = body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| format!("token endpoint returned {status}"));
                return Err(SheetError::Authentication(reason));
            }
        };

        let expires_at = now + Duration::seconds(body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        *self.cached.write() = Some(CachedToken {
            value: SecretString::from(access.clone()),
            expires_at,
        });
        Ok(access)
    }
}

fn segment<T: Serialize>(value: &T) -> Result<String, SheetError> {
    let json = serde_json::to_vec(value).map_err(|e| SheetError::Serialization(e.to_string()))?;
    Ok(BASE64URL.encode(json))
}
