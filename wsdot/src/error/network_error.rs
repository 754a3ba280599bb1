//! Transport-level errors.

use thiserror::Error;

/// Failures retrieving a payload, independent of its content.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failed due to a network or protocol error.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned a non-success HTTP status code.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Request exceeded the configured timeout.
    #[error("Request timeout after {duration_ms}ms")]
    Timeout {
        /// The timeout in milliseconds.
        duration_ms: u64,
    },

    /// The body was not well-formed JSON.
    #[error("Malformed response body: {message}")]
    MalformedBody {
        /// Parser diagnostic.
        message: String,
    },

    /// A script-injection call's callback never fired.
    #[error("Callback {callback} not invoked within {duration_ms}ms")]
    CallbackTimeout {
        /// The per-call callback name.
        callback: String,
        /// The timeout in milliseconds.
        duration_ms: u64,
    },

    /// The injected script failed to load.
    #[error("Script for callback {callback} failed to load: {message}")]
    ScriptLoad {
        /// The per-call callback name.
        callback: String,
        /// Load failure description.
        message: String,
    },
}

impl NetworkError {
    /// Returns the HTTP status code if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` for either kind of timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::CallbackTimeout { .. } => true,
            Self::Request(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_extraction() {
        let err = NetworkError::HttpStatus {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.status_code(), Some(404));

        let timeout = NetworkError::Timeout { duration_ms: 1000 };
        assert_eq!(timeout.status_code(), None);
    }

    #[test]
    fn callback_timeout_is_timeout() {
        let err = NetworkError::CallbackTimeout {
            callback: "__wsdot_cb_1".to_string(),
            duration_ms: 10_000,
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Callback __wsdot_cb_1 not invoked within 10000ms"
        );
    }

    #[test]
    fn malformed_body_is_not_timeout() {
        let err = NetworkError::MalformedBody {
            message: "expected value at line 1 column 1".to_string(),
        };
        assert!(!err.is_timeout());
    }
}
