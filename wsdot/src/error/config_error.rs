//! Client configuration errors.

use thiserror::Error;
use wsdot_define::DescriptorError;

/// Errors building a client or registering descriptors.
///
/// These occur during setup and indicate invalid configuration, not a
/// failed request.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A base URL or override could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A descriptor failed validation.
    #[error("Invalid endpoint descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// An unknown transport name was configured.
    #[error("Unknown transport `{value}` (expected `direct` or `script`)")]
    UnknownTransport {
        /// The rejected value.
        value: String,
    },

    /// A typed endpoint's Rust types do not match its descriptor's shapes.
    #[error("Types for `{function_name}` do not match its descriptor")]
    SchemaMismatch {
        /// The endpoint's function name.
        function_name: String,
    },

    /// No endpoint with this function name exists in the group.
    #[error("Unknown function `{name}` in group `{group}`")]
    UnknownFunction {
        /// The group searched.
        group: String,
        /// The requested name.
        name: String,
    },

    /// Two accessors with the same function name were registered.
    #[error("Duplicate function name: {name}")]
    DuplicateFunction {
        /// The duplicated name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err = ConfigError::InvalidUrl(url_err);
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn unknown_transport() {
        let err = ConfigError::UnknownTransport {
            value: "carrier-pigeon".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown transport `carrier-pigeon` (expected `direct` or `script`)"
        );
    }
}
