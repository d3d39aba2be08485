//! GTFS-realtime vehicle positions, as JSON
//!
//! Upstream JSON comes from a protobuf encoder and is not consistent with the static
//! schema: `route_id` is a number, keys may be camelCase, 64 bits timestamps may be strings
//! and enumerations may be labels. Deserialization accepts all of this, serialization always
//! emits snake_case keys, string identifiers, numeric timestamps and enumeration ordinals.
//!
//! See <https://gtfs.org/documentation/realtime/reference/>
use crate::enums::{Incrementality, OccupancyStatus, ScheduleRelationship};
use crate::serde_helpers::*;
use crate::Error;

/// The feed envelope: `{ header, entity[] }`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FeedMessage {
    /// Metadata about the feed
    pub header: FeedHeader,
    /// Contents of the feed; entities that cannot be read are dropped
    #[serde(default, deserialize_with = "de_skip_malformed")]
    pub entity: Vec<FeedEntity>,
}

impl FeedMessage {
    /// Reads and normalizes an upstream JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<FeedMessage, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Entities that carry a vehicle position
    pub fn vehicles(&self) -> impl Iterator<Item = &VehiclePosition> {
        self.entity.iter().filter_map(|e| e.vehicle.as_ref())
    }
}

/// Metadata about a feed message
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FeedHeader {
    /// Version of the feed specification, e.g. `2.0`
    #[serde(
        alias = "gtfsRealtimeVersion",
        default,
        deserialize_with = "de_string_or_number"
    )]
    pub gtfs_realtime_version: String,
    /// Full snapshot or difference
    #[serde(default, deserialize_with = "de_or_default")]
    pub incrementality: Incrementality,
    /// Moment the content was created, POSIX seconds
    #[serde(default, deserialize_with = "de_lenient_u64")]
    pub timestamp: u64,
    /// Version of the producer data
    #[serde(
        alias = "feedVersion",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub feed_version: Option<String>,
}

/// One entity of the feed. Trip updates and alerts are ignored
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FeedEntity {
    /// Unique identifier within the message
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    /// The entity must be removed, only in differential feeds
    #[serde(alias = "isDeleted", default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
    /// Position of a vehicle
    #[serde(
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle: Option<VehiclePosition>,
}

/// Realtime position of a vehicle
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct VehiclePosition {
    /// The trip this vehicle is serving
    #[serde(
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub trip: Option<TripDescriptor>,
    /// The vehicle itself
    #[serde(
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle: Option<VehicleDescriptor>,
    /// Current position
    #[serde(
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Position>,
    /// Index of the current stop in the trip
    #[serde(
        alias = "currentStopSequence",
        default,
        deserialize_with = "de_option_lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_stop_sequence: Option<u64>,
    /// Current stop
    #[serde(
        alias = "stopId",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_id: Option<String>,
    /// How full the vehicle is
    #[serde(
        alias = "occupancyStatus",
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub occupancy_status: Option<OccupancyStatus>,
    /// Moment the position was measured, POSIX seconds
    #[serde(
        default,
        deserialize_with = "de_option_lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<u64>,
}

/// Identifies a trip of the static schedule
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TripDescriptor {
    /// `trip_id` from trips.txt
    #[serde(
        alias = "tripId",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub trip_id: Option<String>,
    /// `route_id` from routes.txt, always a string
    #[serde(
        alias = "routeId",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub route_id: Option<String>,
    /// `direction_id` from trips.txt
    #[serde(
        alias = "directionId",
        default,
        deserialize_with = "de_option_lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub direction_id: Option<u64>,
    /// Scheduled start time, `HH:MM:SS`
    #[serde(
        alias = "startTime",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<String>,
    /// Service date, `YYYYMMDD`
    #[serde(
        alias = "startDate",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<String>,
    /// Relation with the static schedule
    #[serde(
        alias = "scheduleRelationship",
        default,
        deserialize_with = "de_option_or_warn",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_relationship: Option<ScheduleRelationship>,
}

/// Identifies a vehicle
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct VehicleDescriptor {
    /// Internal identifier
    #[serde(
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Label shown to riders
    #[serde(
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub label: Option<String>,
    /// License plate
    #[serde(
        alias = "licensePlate",
        default,
        deserialize_with = "de_option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub license_plate: Option<String>,
}

/// Geographic position of a vehicle
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Position {
    /// Degrees North, WGS-84
    #[serde(deserialize_with = "de_lenient_f64")]
    pub latitude: f64,
    /// Degrees East, WGS-84
    #[serde(deserialize_with = "de_lenient_f64")]
    pub longitude: f64,
    /// Degrees clockwise from North
    #[serde(
        default,
        deserialize_with = "de_option_lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub bearing: Option<f64>,
    /// Meters per second
    #[serde(
        default,
        deserialize_with = "de_option_lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub speed: Option<f64>,
    /// Meters
    #[serde(
        default,
        deserialize_with = "de_option_lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub odometer: Option<f64>,
}
