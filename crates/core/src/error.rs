//! Error taxonomy shared by the brokerage and spreadsheet collaborators.
//!
//! Configuration errors are fatal before any network activity. Brokerage and
//! sheet errors are recovered per record or per stage by the caller.

use thiserror::Error;

/// Missing or invalid settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required values are absent.
    #[error("missing required configuration: {0}")]
    Missing(String),

    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by a [`crate::Brokerage`] implementation.
#[derive(Debug, Error)]
pub enum BrokerageError {
    /// Login failed or the session is not authenticated.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Throttled by the brokerage.
    #[error("rate limit exceeded (429), retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds the server asked us to wait.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A response lacked a field the caller needs.
    #[error("missing field `{field}` in {context}")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
        /// Resource being parsed.
        context: String,
    },
}

impl BrokerageError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rate limit error.
    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: &'static str, context: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            context: context.into(),
        }
    }

    /// Returns true if the request may succeed when repeated later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500 || *status_code == 429,
            _ => false,
        }
    }
}

/// Errors raised by a [`crate::SpreadsheetBackend`] implementation.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Service account credentials could not be read or parsed.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Token exchange failed.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// No spreadsheet with this name is shared with the service account.
    #[error("spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    /// No worksheet with this title exists.
    #[error("worksheet not found: {0}")]
    WorksheetNotFound(String),

    /// An A1 range could not be parsed.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// `open` has not been called yet.
    #[error("no spreadsheet is open")]
    NotOpen,

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Write quota exhausted.
    #[error("rate limit exceeded (429): {0}")]
    RateLimit(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SheetError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }
}

/// Failure of a call wrapped by [`crate::RateLimitHandler`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The failure was not throttling; returned after the first attempt.
    #[error("{0}")]
    Permanent(E),

    /// Throttling persisted past the retry ceiling.
    #[error("max retries ({retries}) exceeded after {attempts} attempts: {last}")]
    Exhausted {
        /// Configured retry ceiling.
        retries: u32,
        /// Total attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },
}

impl<E> RetryError<E> {
    /// Returns the underlying error from the last attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) | Self::Exhausted { last: e, .. } => e,
        }
    }

    /// Returns true if the retry ceiling was the cause.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
