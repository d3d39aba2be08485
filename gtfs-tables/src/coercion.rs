//! Column types of the GTFS static files
//!
//! Types follow <https://gtfs.org/documentation/schedule/reference/>. Only columns that are
//! not plain text are listed; identifiers, names, colors and times stay strings.
use crate::objects::TypedValue;
use crate::serde_helpers::{parse_date, parse_float, parse_integer, parse_url};
use crate::MalformedField;
use log::warn;

/// Target type of a column
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Kept as the raw string
    Text,
    /// Sequence numbers, counts, durations and enumeration ordinals
    Integer,
    /// Latitudes, longitudes, distances, prices
    Float,
    /// `YYYYMMDD` service dates
    Date,
    /// Absolute urls
    Url,
}

/// Type of `column` in `table` (table name without the `.txt` extension)
pub fn column_type(table: &str, column: &str) -> ColumnType {
    use ColumnType::*;

    match (table, column) {
        ("agency", "agency_url" | "agency_fare_url") => Url,

        ("stops", "stop_lat" | "stop_lon") => Float,
        ("stops", "location_type" | "wheelchair_boarding") => Integer,
        ("stops", "stop_url") => Url,

        (
            "routes",
            "route_type" | "route_sort_order" | "continuous_pickup" | "continuous_drop_off",
        ) => Integer,
        ("routes", "route_url") => Url,

        ("trips", "direction_id" | "wheelchair_accessible" | "bikes_allowed") => Integer,

        (
            "stop_times",
            "stop_sequence"
            | "pickup_type"
            | "drop_off_type"
            | "continuous_pickup"
            | "continuous_drop_off"
            | "timepoint",
        ) => Integer,
        ("stop_times", "shape_dist_traveled") => Float,

        (
            "calendar",
            "monday" | "tuesday" | "wednesday" | "thursday" | "friday" | "saturday" | "sunday",
        ) => Integer,
        ("calendar", "start_date" | "end_date") => Date,

        ("calendar_dates", "date") => Date,
        ("calendar_dates", "exception_type") => Integer,

        ("shapes", "shape_pt_lat" | "shape_pt_lon" | "shape_dist_traveled") => Float,
        ("shapes", "shape_pt_sequence") => Integer,

        ("frequencies", "headway_secs" | "exact_times") => Integer,

        ("transfers", "transfer_type" | "min_transfer_time") => Integer,

        ("pathways", "pathway_mode" | "is_bidirectional" | "traversal_time" | "stair_count") => {
            Integer
        }
        ("pathways", "length" | "max_slope" | "min_width") => Float,

        ("levels", "level_index") => Float,

        ("fare_attributes", "price") => Float,
        ("fare_attributes", "payment_method" | "transfers" | "transfer_duration") => Integer,

        ("feed_info", "feed_start_date" | "feed_end_date") => Date,
        ("feed_info", "feed_publisher_url" | "feed_contact_url") => Url,

        // Metlink extensions
        ("stop_patterns", "stop_sequence") => Integer,
        ("stop_pattern_trips", "direction_id") => Integer,

        _ => Text,
    }
}

/// Converts a raw field to `ty`
///
/// An empty field is [TypedValue::Null] for every typed column, it is not an error.
/// The error is the reason the non-empty value was rejected.
pub(crate) fn try_coerce(ty: ColumnType, raw: &str) -> Result<TypedValue, String> {
    match ty {
        ColumnType::Text => Ok(TypedValue::String(raw.to_owned())),
        _ if raw.is_empty() => Ok(TypedValue::Null),
        ColumnType::Integer => parse_integer(raw).map(TypedValue::Integer),
        ColumnType::Float => parse_float(raw).map(TypedValue::Float),
        ColumnType::Date => parse_date(raw).map(TypedValue::Date),
        ColumnType::Url => parse_url(raw).map(TypedValue::Url),
    }
}

/// Converts one field of `table` to the type of `column`
///
/// Never fails: a value that cannot be converted is logged and becomes [TypedValue::Null].
pub fn coerce(table: &str, column: &str, raw: &str) -> TypedValue {
    match try_coerce(column_type(table, column), raw) {
        Ok(value) => value,
        Err(reason) => {
            warn!(
                "{}",
                MalformedField {
                    table: table.to_owned(),
                    column: column.to_owned(),
                    value: raw.to_owned(),
                    reason,
                }
            );
            TypedValue::Null
        }
    }
}
