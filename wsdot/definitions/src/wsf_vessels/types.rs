//! WSF Vessels payload types.
//!
//! Field names follow the service's PascalCase JSON keys. Fields the
//! service is known to null out are `Option`s with nullable shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wsdot_define::{Field, Schema, Shape};

/// Input for the `...ByVesselId` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VesselIdInput {
    /// Unique vessel identifier.
    #[serde(rename = "VesselID")]
    pub vessel_id: i32,
}

impl Schema for VesselIdInput {
    fn shape() -> Shape {
        Shape::object([Field::new("VesselID", Shape::Integer)])
    }
}

/// A vessel class (e.g. Jumbo Mark II).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VesselClass {
    #[serde(rename = "ClassID")]
    pub class_id: i32,
    #[serde(rename = "ClassSubjectID")]
    pub class_subject_id: i32,
    pub class_name: Option<String>,
    pub sort_seq: Option<i32>,
    pub drawing_img: Option<String>,
    pub silhouette_img: Option<String>,
    pub public_display_name: Option<String>,
}

impl Schema for VesselClass {
    fn shape() -> Shape {
        Shape::object([
            Field::new("ClassID", Shape::Integer),
            Field::new("ClassSubjectID", Shape::Integer),
            Field::new("ClassName", Shape::String).nullable(),
            Field::new("SortSeq", Shape::Integer).nullable(),
            Field::new("DrawingImg", Shape::String).nullable(),
            Field::new("SilhouetteImg", Shape::String).nullable(),
            Field::new("PublicDisplayName", Shape::String).nullable(),
        ])
    }
}

/// Basic details for one vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VesselBasic {
    #[serde(rename = "VesselID")]
    pub vessel_id: i32,
    #[serde(rename = "VesselSubjectID")]
    pub vessel_subject_id: i32,
    pub vessel_name: Option<String>,
    pub vessel_abbrev: Option<String>,
    pub class: VesselClass,
    /// 1 = in service, 2 = in maintenance, 3 = out of service.
    pub status: Option<i32>,
    #[serde(rename = "OwnedByWSF")]
    pub owned_by_wsf: bool,
}

impl Schema for VesselBasic {
    fn shape() -> Shape {
        Shape::object([
            Field::new("VesselID", Shape::Integer),
            Field::new("VesselSubjectID", Shape::Integer),
            Field::new("VesselName", Shape::String).nullable(),
            Field::new("VesselAbbrev", Shape::String).nullable(),
            Field::new("Class", VesselClass::shape()),
            Field::new("Status", Shape::Integer).nullable(),
            Field::new("OwnedByWSF", Shape::Boolean),
        ])
    }
}

/// Live position and voyage state for one vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VesselLocation {
    #[serde(rename = "VesselID")]
    pub vessel_id: i32,
    pub vessel_name: Option<String>,
    pub mmsi: Option<i32>,
    #[serde(rename = "DepartingTerminalID")]
    pub departing_terminal_id: i32,
    pub departing_terminal_name: Option<String>,
    pub departing_terminal_abbrev: Option<String>,
    #[serde(rename = "ArrivingTerminalID")]
    pub arriving_terminal_id: Option<i32>,
    pub arriving_terminal_name: Option<String>,
    pub arriving_terminal_abbrev: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Knots.
    pub speed: f64,
    /// Degrees from true north.
    pub heading: f64,
    pub in_service: bool,
    pub at_dock: bool,
    pub left_dock: Option<DateTime<Utc>>,
    pub eta: Option<DateTime<Utc>>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    /// Absent on some legacy payloads.
    #[serde(default)]
    pub op_route_abbrev: Vec<String>,
    pub vessel_position_num: Option<i32>,
    pub time_stamp: DateTime<Utc>,
}

impl Schema for VesselLocation {
    fn shape() -> Shape {
        Shape::object([
            Field::new("VesselID", Shape::Integer),
            Field::new("VesselName", Shape::String).nullable(),
            Field::new("Mmsi", Shape::Integer).nullable(),
            Field::new("DepartingTerminalID", Shape::Integer),
            Field::new("DepartingTerminalName", Shape::String).nullable(),
            Field::new("DepartingTerminalAbbrev", Shape::String).nullable(),
            Field::new("ArrivingTerminalID", Shape::Integer).nullable(),
            Field::new("ArrivingTerminalName", Shape::String).nullable(),
            Field::new("ArrivingTerminalAbbrev", Shape::String).nullable(),
            Field::new("Latitude", Shape::Number),
            Field::new("Longitude", Shape::Number),
            Field::new("Speed", Shape::Number),
            Field::new("Heading", Shape::Number),
            Field::new("InService", Shape::Boolean),
            Field::new("AtDock", Shape::Boolean),
            Field::new("LeftDock", Shape::Date).nullable(),
            Field::new("Eta", Shape::Date).nullable(),
            Field::new("ScheduledDeparture", Shape::Date).nullable(),
            Field::new("OpRouteAbbrev", Shape::array(Shape::String)).optional(),
            Field::new("VesselPositionNum", Shape::Integer).nullable(),
            Field::new("TimeStamp", Shape::Date),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vessel_basic_deserializes_service_keys() {
        let raw = json!({
            "VesselID": 74,
            "VesselSubjectID": 1,
            "VesselName": "Chimacum",
            "VesselAbbrev": "CHM",
            "Class": {
                "ClassID": 100,
                "ClassSubjectID": 310,
                "ClassName": "Olympic",
                "SortSeq": 40,
                "DrawingImg": null,
                "SilhouetteImg": null,
                "PublicDisplayName": "Olympic"
            },
            "Status": 1,
            "OwnedByWSF": true
        });

        let vessel: VesselBasic = serde_json::from_value(raw).unwrap();
        assert_eq!(vessel.vessel_id, 74);
        assert_eq!(vessel.class.class_name.as_deref(), Some("Olympic"));
        assert!(vessel.class.drawing_img.is_none());
    }

    #[test]
    fn input_serializes_to_path_key() {
        let input = VesselIdInput { vessel_id: 74 };
        assert_eq!(serde_json::to_value(input).unwrap(), json!({"VesselID": 74}));
    }

    #[test]
    fn serialized_keys_match_shape_fields() {
        let location = VesselLocation {
            vessel_id: 1,
            vessel_name: None,
            mmsi: None,
            departing_terminal_id: 3,
            departing_terminal_name: None,
            departing_terminal_abbrev: None,
            arriving_terminal_id: None,
            arriving_terminal_name: None,
            arriving_terminal_abbrev: None,
            latitude: 47.6,
            longitude: -122.3,
            speed: 0.0,
            heading: 180.0,
            in_service: true,
            at_dock: true,
            left_dock: None,
            eta: None,
            scheduled_departure: None,
            op_route_abbrev: vec!["sea-bi".to_string()],
            vessel_position_num: Some(1),
            time_stamp: DateTime::from_timestamp_millis(0).unwrap(),
        };
        let value = serde_json::to_value(&location).unwrap();
        let shape = VesselLocation::shape();
        for key in value.as_object().unwrap().keys() {
            assert!(shape.field(key).is_some(), "{key} missing from shape");
        }
        for field in shape.fields() {
            assert!(value.get(&field.name).is_some(), "{} not serialized", field.name);
        }
    }
}
