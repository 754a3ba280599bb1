//! WSDOT/WSF API Definitions
//!
//! Descriptor data for the wrapped API domains, built from the primitives in
//! `wsdot-define`. Each domain lives in its own module.
//!
//! ## Available APIs
//!
//! - [`wsf_vessels`] - Washington State Ferries vessel API
//!
//! ## Examples
//!
//! ```
//! use wsdot_definitions::wsf_vessels;
//!
//! let api = wsf_vessels::api();
//! assert_eq!(api.name, "wsf-vessels");
//! assert_eq!(wsf_vessels::groups().len(), 3);
//! ```

pub mod prelude;
pub mod wsf_vessels;

use wsdot_define::{ApiMetadata, EndpointGroupMeta};

/// Every shipped API domain with its endpoint groups.
pub fn all_apis() -> Vec<(ApiMetadata, Vec<EndpointGroupMeta>)> {
    vec![(wsf_vessels::api(), wsf_vessels::groups())]
}
