//! Washington State Ferries vessel API.
//!
//! ## Groups
//!
//! - `vesselBasics` (STATIC) - names, classes and ownership
//! - `vesselLocations` (REALTIME) - live positions
//! - `cacheFlushDate` (STATIC) - when static data last changed

mod types;

pub use types::{VesselBasic, VesselClass, VesselIdInput, VesselLocation};

use chrono::{DateTime, Utc};
use serde_json::json;
use wsdot_define::{ApiMetadata, CacheStrategy, EndpointGroupMeta, EndpointMeta, NoInput};

/// Domain name used in cache keys.
pub const API_NAME: &str = "wsf-vessels";

/// Production base URL.
pub const BASE_URL: &str = "https://www.wsdot.wa.gov/ferries/api/vessels/rest";

/// Creates the domain metadata.
///
/// ## Examples
///
/// ```
/// use wsdot_definitions::wsf_vessels;
///
/// let api = wsf_vessels::api();
/// assert_eq!(api.cache_flush_path.as_deref(), Some("/cacheflushdate"));
/// ```
pub fn api() -> ApiMetadata {
    ApiMetadata::new(API_NAME, BASE_URL).with_cache_flush_path("/cacheflushdate")
}

/// Every endpoint group of the domain.
pub fn groups() -> Vec<EndpointGroupMeta> {
    vec![
        vessel_basics_group(),
        vessel_locations_group(),
        cache_flush_date_group(),
    ]
}

/// Vessel names, classes and ownership.
pub fn vessel_basics_group() -> EndpointGroupMeta {
    EndpointGroupMeta {
        name: "vesselBasics".to_string(),
        cache_strategy: CacheStrategy::Static,
        documentation: "Basic details for every vessel in the fleet".to_string(),
        endpoints: vec![
            EndpointMeta::new::<NoInput, Vec<VesselBasic>>("vesselBasics", "/vesselBasics")
                .with_description("Basic details for all vessels"),
            EndpointMeta::new::<VesselIdInput, VesselBasic>(
                "vesselBasicsByVesselId",
                "/vesselBasics/{VesselID}",
            )
            .with_sample_params(json!({"VesselID": 74}))
            .with_description("Basic details for one vessel"),
        ],
    }
}

/// Live vessel positions.
pub fn vessel_locations_group() -> EndpointGroupMeta {
    EndpointGroupMeta {
        name: "vesselLocations".to_string(),
        cache_strategy: CacheStrategy::Realtime,
        documentation: "Current position, heading and voyage of each vessel".to_string(),
        endpoints: vec![
            EndpointMeta::new::<NoInput, Vec<VesselLocation>>(
                "vesselLocations",
                "/vesselLocations",
            )
            .with_description("Locations of all vessels"),
            EndpointMeta::new::<VesselIdInput, VesselLocation>(
                "vesselLocationsByVesselId",
                "/vesselLocations/{VesselID}",
            )
            .with_sample_params(json!({"VesselID": 74}))
            .with_description("Location of one vessel"),
        ],
    }
}

/// The domain's cache flush sentinel.
pub fn cache_flush_date_group() -> EndpointGroupMeta {
    EndpointGroupMeta {
        name: "cacheFlushDate".to_string(),
        cache_strategy: CacheStrategy::Static,
        documentation: "Time the domain's static data last changed".to_string(),
        endpoints: vec![
            EndpointMeta::new::<NoInput, DateTime<Utc>>("cacheFlushDate", "/cacheflushdate")
                .with_description("Cache flush date"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsdot_define::{Schema, path_params};

    #[test]
    fn by_id_endpoints_take_vessel_id() {
        for group in [vessel_basics_group(), vessel_locations_group()] {
            let by_id = group
                .endpoints
                .iter()
                .find(|e| e.function_name.ends_with("ByVesselId"))
                .unwrap();
            assert_eq!(path_params(&by_id.endpoint).unwrap(), vec!["VesselID"]);
            assert_eq!(by_id.input, VesselIdInput::shape());
        }
    }

    #[test]
    fn strategies_per_group() {
        assert_eq!(vessel_basics_group().cache_strategy, CacheStrategy::Static);
        assert_eq!(vessel_locations_group().cache_strategy, CacheStrategy::Realtime);
    }

    #[test]
    fn flush_group_matches_api_flush_path() {
        let group = cache_flush_date_group();
        assert_eq!(
            Some(group.endpoints[0].endpoint.as_str()),
            api().cache_flush_path.as_deref()
        );
    }

    #[test]
    fn sample_params_cover_path_tokens() {
        for group in groups() {
            for endpoint in &group.endpoints {
                for token in path_params(&endpoint.endpoint).unwrap() {
                    assert!(
                        endpoint.sample_params.get(token).is_some(),
                        "{} sample lacks {token}",
                        endpoint.function_name
                    );
                }
            }
        }
    }
}
