//! Convenient re-exports for writing endpoint descriptors.
//!
//! ## Examples
//!
//! ```
//! use wsdot_define::prelude::*;
//!
//! let shape = Shape::object([Field::new("VesselID", Shape::Integer)]);
//! assert!(shape.field("VesselID").is_some());
//! ```

pub use crate::error::DescriptorError;
pub use crate::shape::{Field, NoInput, Schema, Shape};
pub use crate::types::{ApiMetadata, CacheStrategy, EndpointGroupMeta, EndpointMeta};
