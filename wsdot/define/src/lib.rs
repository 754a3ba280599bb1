//! WSDOT Endpoint Descriptor Library
//!
//! This crate provides the static, declarative records that describe the
//! read-only REST surface of the Washington State DOT and Washington State
//! Ferries traveler information APIs. The records are pure data: they are
//! consumed by the `wsdot` runtime crate, which turns each descriptor into a
//! validated fetch function and a cache-aware query hook.
//!
//! ## Core Types
//!
//! - [`ApiMetadata`] - One wrapped API domain (name + base URL)
//! - [`EndpointGroupMeta`] - Endpoints sharing a [`CacheStrategy`]
//! - [`EndpointMeta`] - A single accessor: function name, path template, schemas
//! - [`CacheStrategy`] - `STATIC` or `REALTIME` invalidation policy
//! - [`Shape`] / [`Field`] - Runtime schema descriptors used for validation
//! - [`Schema`] - Links a Rust type to its [`Shape`]
//!
//! ## Examples
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wsdot_define::{
//!     CacheStrategy, EndpointGroupMeta, EndpointMeta, Field, NoInput, Schema, Shape,
//! };
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Terminal {
//!     #[serde(rename = "TerminalID")]
//!     terminal_id: i32,
//! }
//!
//! impl Schema for Terminal {
//!     fn shape() -> Shape {
//!         Shape::object([Field::new("TerminalID", Shape::Integer)])
//!     }
//! }
//!
//! let group = EndpointGroupMeta {
//!     name: "terminalBasics".to_string(),
//!     cache_strategy: CacheStrategy::Static,
//!     documentation: "Terminal basics".to_string(),
//!     endpoints: vec![EndpointMeta::new::<NoInput, Vec<Terminal>>(
//!         "terminalBasics",
//!         "/terminalBasics",
//!     )],
//! };
//!
//! assert!(group.validate().is_ok());
//! ```

pub mod error;
pub mod prelude;
pub mod shape;
pub mod template;
pub mod types;

pub use error::DescriptorError;
pub use shape::{Field, NoInput, Schema, Shape};
pub use template::{TemplatePart, parse_template, path_params};
pub use types::{ApiMetadata, CacheStrategy, EndpointGroupMeta, EndpointMeta};
