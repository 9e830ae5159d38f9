//! Crate-wide error hierarchy for the posting adapter.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 403→Forbidden,
//!   422→Unprocessable, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type PrResult<T> = Result<T, Error>;

/// Root error type for the pr-reviewer crate.
#[derive(Debug, Error)]
pub enum Error {
    /// GitHub API failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Unexpected payload shapes, bad tokens, etc.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this is the 422 capacity case the batch fallback handles.
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, Error::Provider(ProviderError::Unprocessable))
    }

    /// Whether this is the 403 case that warrants fork-token guidance.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Provider(ProviderError::Forbidden))
    }
}

/// Detailed provider-specific error used inside the GitHub layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403) — typically a read-only fork token.
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Unprocessable entity (HTTP 422) — inline positions rejected.
    #[error("unprocessable entity")]
    Unprocessable,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited,

    /// Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status.
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Maps an HTTP status code onto the taxonomy.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            422 => ProviderError::Unprocessable,
            429 => ProviderError::RateLimited,
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16());
        }
        ProviderError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_the_interesting_codes() {
        assert!(matches!(ProviderError::from_status(403), ProviderError::Forbidden));
        assert!(matches!(ProviderError::from_status(422), ProviderError::Unprocessable));
        assert!(matches!(ProviderError::from_status(503), ProviderError::Server(503)));
        assert!(matches!(ProviderError::from_status(418), ProviderError::HttpStatus(418)));
    }

    #[test]
    fn predicates_see_through_the_root_error() {
        let err: Error = ProviderError::Unprocessable.into();
        assert!(err.is_unprocessable());
        let err: Error = ProviderError::Forbidden.into();
        assert!(err.is_forbidden());
    }
}
