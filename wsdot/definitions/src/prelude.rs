//! Convenient re-exports for working with API definitions.
//!
//! ## Examples
//!
//! ```
//! use wsdot_definitions::prelude::*;
//!
//! let group = vessel_basics_group();
//! assert_eq!(group.cache_strategy, CacheStrategy::Static);
//! ```

pub use wsdot_define::prelude::*;

pub use crate::all_apis;
pub use crate::wsf_vessels::{
    VesselBasic, VesselClass, VesselIdInput, VesselLocation, cache_flush_date_group,
    vessel_basics_group, vessel_locations_group,
};
