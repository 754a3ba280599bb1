//! Application-level errors reported by the wrapped services.

use thiserror::Error;

/// The service answered at the transport level but the payload is an error.
///
/// WSDOT services echo failures such as a bad access code as a small JSON
/// object with a `Message` key, with HTTP 200.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An error object was returned instead of the expected payload.
    #[error("API error: {message}")]
    ErrorPayload {
        /// Message extracted from the payload.
        message: String,
        /// The raw payload as received.
        payload: serde_json::Value,
    },
}

/// Keys the services use for echoed error messages.
const MESSAGE_KEYS: [&str; 3] = ["Message", "ErrorMessage", "message"];

impl ApiError {
    /// Recognizes an echoed error payload.
    ///
    /// Returns `None` unless `payload` is an object carrying a string under
    /// one of the known message keys.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        let object = payload.as_object()?;
        let message = MESSAGE_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(serde_json::Value::as_str))?;
        Some(Self::ErrorPayload {
            message: message.to_string(),
            payload: payload.clone(),
        })
    }
}
