//! Core descriptor types.
//!
//! - [`ApiMetadata`] - A wrapped API domain
//! - [`CacheStrategy`] - Invalidation policy shared by a group
//! - [`EndpointGroupMeta`] - Endpoints sharing one cache strategy
//! - [`EndpointMeta`] - Everything needed to build one accessor

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::DescriptorError;
use crate::shape::{Schema, Shape};
use crate::template::path_params;

/// One wrapped API domain (e.g. `wsf-vessels`).
///
/// ## Examples
///
/// ```
/// use wsdot_define::ApiMetadata;
///
/// let api = ApiMetadata::new("wsf-vessels", "https://www.wsdot.wa.gov/ferries/api/vessels/rest")
///     .with_cache_flush_path("/cacheflushdate");
/// assert_eq!(api.cache_flush_path.as_deref(), Some("/cacheflushdate"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiMetadata {
    /// Domain name; the first component of every cache key.
    pub name: String,
    /// Base URL that endpoint templates are appended to.
    pub base_url: String,
    /// Path of the companion endpoint returning the domain's cache flush date.
    pub cache_flush_path: Option<String>,
}

impl ApiMetadata {
    /// Creates API metadata without a cache flush endpoint.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            cache_flush_path: None,
        }
    }

    /// Sets the path of the domain's cache flush date endpoint.
    pub fn with_cache_flush_path(mut self, path: impl Into<String>) -> Self {
        self.cache_flush_path = Some(path.into());
        self
    }
}

/// How long fetched data stays valid.
///
/// ## Examples
///
/// ```
/// use std::str::FromStr;
/// use wsdot_define::CacheStrategy;
///
/// assert_eq!(CacheStrategy::Realtime.to_string(), "REALTIME");
/// assert_eq!(CacheStrategy::from_str("STATIC").unwrap(), CacheStrategy::Static);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CacheStrategy {
    /// Valid until the domain's cache flush date changes.
    Static,
    /// Stale after a short fixed interval.
    Realtime,
}

/// Metadata for one accessor.
///
/// Build with [`EndpointMeta::new`] so the input and output shapes always
/// come from the typed [`Schema`] implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointMeta {
    /// camelCase accessor name, e.g. `vesselBasicsByVesselId`.
    pub function_name: String,
    /// Path template, e.g. `/vesselBasics/{VesselID}`.
    pub endpoint: String,
    /// Shape of the accepted input.
    pub input: Shape,
    /// Shape of the returned payload.
    pub output: Shape,
    /// Example parameters, valid against `input`.
    pub sample_params: serde_json::Value,
    /// Human-readable description.
    pub endpoint_description: String,
}

impl EndpointMeta {
    /// Creates a descriptor whose shapes are taken from `I` and `O`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use wsdot_define::{EndpointMeta, NoInput};
    ///
    /// let meta = EndpointMeta::new::<NoInput, Vec<String>>("terminalNames", "/terminalNames")
    ///     .with_description("Terminal names");
    /// assert_eq!(meta.fetch_name(), "fetchTerminalNames");
    /// assert_eq!(meta.hook_name(), "useTerminalNames");
    /// ```
    pub fn new<I: Schema, O: Schema>(
        function_name: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            endpoint: endpoint.into(),
            input: I::shape(),
            output: O::shape(),
            sample_params: serde_json::Value::Object(serde_json::Map::new()),
            endpoint_description: String::new(),
        }
    }

    /// Sets the example parameters.
    pub fn with_sample_params(mut self, params: serde_json::Value) -> Self {
        self.sample_params = params;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.endpoint_description = description.into();
        self
    }

    /// Name of the generated fetch function (`fetchX`).
    pub fn fetch_name(&self) -> String {
        format!("fetch{}", upper_first(&self.function_name))
    }

    /// Name of the generated hook (`useX`).
    pub fn hook_name(&self) -> String {
        format!("use{}", upper_first(&self.function_name))
    }

    /// Checks the template against the input shape.
    ///
    /// ## Errors
    ///
    /// - [`DescriptorError::InvalidFunctionName`] for a non-identifier name
    /// - template syntax errors from [`crate::parse_template`]
    /// - [`DescriptorError::UnknownPathParam`] when a token has no input field
    /// - [`DescriptorError::OptionalPathParam`] when a token's field may be absent
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut chars = self.function_name.chars();
        let valid_name = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(DescriptorError::InvalidFunctionName {
                name: self.function_name.clone(),
            });
        }

        for param in path_params(&self.endpoint)? {
            let field = self
                .input
                .field(param)
                .ok_or_else(|| DescriptorError::UnknownPathParam {
                    function_name: self.function_name.clone(),
                    param: param.to_string(),
                })?;
            if field.shape.is_optional() {
                return Err(DescriptorError::OptionalPathParam {
                    function_name: self.function_name.clone(),
                    param: param.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Endpoints sharing one invalidation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointGroupMeta {
    /// Group name, e.g. `vesselBasics`.
    pub name: String,
    /// Strategy applied uniformly to every endpoint in the group.
    pub cache_strategy: CacheStrategy,
    /// Group-level documentation.
    pub documentation: String,
    /// The group's endpoints.
    pub endpoints: Vec<EndpointMeta>,
}

impl EndpointGroupMeta {
    /// Validates every endpoint and checks function names are unique.
    ///
    /// ## Errors
    ///
    /// Returns the first [`DescriptorError`] found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate()?;
            if !seen.insert(endpoint.function_name.as_str()) {
                return Err(DescriptorError::DuplicateFunction {
                    group: self.name.clone(),
                    name: endpoint.function_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Finds an endpoint by function name.
    pub fn endpoint(&self, function_name: &str) -> Option<&EndpointMeta> {
        self.endpoints
            .iter()
            .find(|e| e.function_name == function_name)
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
