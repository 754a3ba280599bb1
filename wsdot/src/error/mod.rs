//! Error types for the request pipeline.
//!
//! Every failure a fetch function or hook can produce is a [`RequestError`],
//! which is exactly one of three kinds:
//!
//! - [`ApiError`] (`API_ERROR`) - the service answered with an error payload
//! - [`NetworkError`] (`NETWORK_ERROR`) - transport failure; may be retried
//! - [`ValidationError`] (`VALIDATION_ERROR`) - input or output failed its schema
//!
//! [`ConfigError`] is separate: it is returned while building a client, never
//! from a request.

mod api_error;
mod config_error;
mod network_error;
mod validation_error;

pub use api_error::ApiError;
pub use config_error::ConfigError;
pub use network_error::NetworkError;
pub use validation_error::{ValidationError, ValidationIssue, ValidationStage};

use strum::{Display, EnumString};
use thiserror::Error;

/// Discriminant of a [`RequestError`], rendered as the wire-style tag.
///
/// ## Examples
///
/// ```
/// use wsdot::error::ErrorKind;
///
/// assert_eq!(ErrorKind::NetworkError.to_string(), "NETWORK_ERROR");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The service signaled an application-level failure.
    ApiError,
    /// The request could not be completed at the transport level.
    NetworkError,
    /// Input or output failed schema validation.
    ValidationError,
}

/// Top-level error for every request operation.
///
/// Callers branch on [`RequestError::kind`] (or match the variants) to decide
/// whether a failure is worth retrying. Nothing in this crate retries on its
/// own.
///
/// ## Examples
///
/// ```rust,ignore
/// match endpoint.fetch(&client, Some(&input)).await {
///     Ok(vessel) => println!("{}", vessel.vessel_name),
///     Err(e) if e.is_retryable() => schedule_retry(),
///     Err(e) => eprintln!("{}: {e}", e.kind()),
/// }
/// ```
#[derive(Debug, Error)]
pub enum RequestError {
    /// Application-level failure reported by the service.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport failure.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Schema validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RequestError {
    /// Returns the error kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(_) => ErrorKind::ApiError,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Validation(_) => ErrorKind::ValidationError,
        }
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if repeating the same request could succeed.
    ///
    /// Only network failures qualify; validation and API errors repeat
    /// deterministically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
