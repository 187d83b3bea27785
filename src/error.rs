//! Error types
//!
//! Every failure the library surfaces falls into one of three groups:
//!
//! - [`Error::Configuration`] - a capability was used without a dependency it
//!   needs, e.g. a resource with no client attached
//! - [`Error::Resolution`] - the transport failed or the server rejected the
//!   request while a pending resource was being resolved
//! - [`Error::InvalidPayload`] - a body or an exported record could not be
//!   decoded into the expected shape
//!
//! `Error` is `Clone` so that a memoized failure can be handed to every caller
//! that forces the same deferred value.

use std::sync::Arc;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    Resolution {
        message: String,
        /// HTTP status of the rejected response, when the server answered
        status: Option<u16>,
        #[source]
        source: Option<Arc<reqwest::Error>>,
    },

    #[error("invalid payload: {message}")]
    InvalidPayload {
        message: String,
        #[source]
        source: Option<Arc<serde_json::Error>>,
    },
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn no_client() -> Self {
        Error::configuration("no client attached to this resource")
    }

    /// Wrap a transport-level failure (connection refused, TLS, timeout...)
    pub(crate) fn transport(error: reqwest::Error) -> Self {
        Error::Resolution {
            message: format!("HTTP error: {error}"),
            status: error.status().map(|s| s.as_u16()),
            source: Some(Arc::new(error)),
        }
    }

    /// A response arrived but its status is outside the 2xx range
    pub(crate) fn rejected(status: reqwest::StatusCode) -> Self {
        Error::Resolution {
            message: format!("server rejected the request: {status}"),
            status: Some(status.as_u16()),
            source: None,
        }
    }

    pub(crate) fn invalid_payload(message: impl Into<String>) -> Self {
        Error::InvalidPayload {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>, error: serde_json::Error) -> Self {
        Error::InvalidPayload {
            message: format!("{}: {error}", message.into()),
            source: Some(Arc::new(error)),
        }
    }

    /// HTTP status carried by a resolution error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Resolution { status, .. } => *status,
            _ => None,
        }
    }

    /// True when this is a resolution error for the given HTTP status
    pub fn is_status(&self, code: u16) -> bool {
        self.status() == Some(code)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, Error::InvalidPayload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_carries_status() {
        let err = Error::rejected(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.status(), Some(404));
        assert!(err.is_status(404));
        assert!(!err.is_status(500));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_non_resolution_errors_have_no_status() {
        assert_eq!(Error::no_client().status(), None);
        assert_eq!(Error::invalid_payload("bad").status(), None);
        assert!(Error::no_client().is_configuration());
        assert!(Error::invalid_payload("bad").is_invalid_payload());
    }

    #[test]
    fn test_malformed_keeps_serde_source() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::malformed("account body", serde_err);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("invalid payload: account body"));
    }
}
