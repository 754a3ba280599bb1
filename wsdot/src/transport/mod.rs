//! Payload retrieval.
//!
//! A [`Transport`] turns a fully built URL into raw JSON. Two strategies are
//! provided:
//!
//! - [`DirectTransport`] - a plain HTTP GET
//! - [`ScriptTransport`] - script injection with a uniquely named callback,
//!   for hosts that cannot issue cross-origin requests directly
//!
//! Transports know nothing about schemas; the caller validates the payload.

mod direct;
mod http_host;
mod script;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use strum::{Display, EnumString};
use url::Url;

use crate::error::RequestError;

pub use direct::DirectTransport;
pub use http_host::{HttpScriptHost, unwrap_callback};
pub use script::{CALLBACK_PREFIX, CallbackRegistry, ScriptElement, ScriptHost, ScriptTransport};

/// `url` without query or fragment, for logs.
///
/// Authorized URLs carry the access token as a query parameter.
pub(crate) fn redacted(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// A boxed future returned by [`Transport::fetch`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieves the JSON payload at a URL.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short name for logs (`direct`, `script`).
    fn name(&self) -> &'static str;

    /// Fetches and parses the payload at `url`.
    ///
    /// ## Errors
    ///
    /// Returns [`RequestError::Network`] for every transport-level failure.
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, RequestError>>;
}

/// Selects the built-in transport.
///
/// ## Examples
///
/// ```
/// use std::str::FromStr;
/// use wsdot::transport::TransportKind;
///
/// assert_eq!(TransportKind::from_str("script").unwrap(), TransportKind::Script);
/// assert_eq!(TransportKind::Direct.to_string(), "direct");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportKind {
    /// Plain HTTP GET.
    #[default]
    Direct,
    /// Script injection with a per-call callback.
    Script,
}
