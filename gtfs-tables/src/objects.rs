use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Column names are shared by every row of a table
pub type ColumnName = Arc<str>;

/// One row of a CSV table, before any conversion
///
/// Columns keep the order of the header. A row shorter than the header simply
/// does not have the trailing columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(ColumnName, String)>,
}

impl RawRecord {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        RawRecord {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, column: ColumnName, value: String) {
        self.fields.push((column, value));
    }

    /// Raw value of a column, `None` if the row does not have it
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| &**name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Number of fields present in the row
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the row has no field at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(column, value)` in header order
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnName, &str)> {
        self.fields.iter().map(|(name, value)| (name, value.as_str()))
    }
}

/// Value of a field once converted to the type of its column
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Empty, or not convertible to the column type
    Null,
    /// Column without a known type, passed through as-is
    String(String),
    /// Sequence numbers, counts and enumerations
    Integer(i64),
    /// Coordinates and distances
    Float(f64),
    /// `YYYYMMDD` dates
    Date(NaiveDate),
    /// Agency, route, stop and publisher urls
    Url(Url),
}

impl TypedValue {
    /// True for [TypedValue::Null]
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => Ok(()),
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Integer(i) => write!(f, "{i}"),
            TypedValue::Float(x) => write!(f, "{x}"),
            TypedValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TypedValue::Url(u) => f.write_str(u.as_str()),
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TypedValue::Null => serializer.serialize_none(),
            TypedValue::String(s) => serializer.serialize_str(s),
            TypedValue::Integer(i) => serializer.serialize_i64(*i),
            TypedValue::Float(x) => serializer.serialize_f64(*x),
            TypedValue::Date(d) => d.serialize(serializer),
            TypedValue::Url(u) => serializer.serialize_str(u.as_str()),
        }
    }
}

/// A [RawRecord] after coercion
///
/// Serializes as a JSON object in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    fields: Vec<(ColumnName, TypedValue)>,
}

impl TypedRecord {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        TypedRecord {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, column: ColumnName, value: TypedValue) {
        self.fields.push((column, value));
    }

    /// Value of a column, `None` if the source row did not have it
    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.fields
            .iter()
            .find(|(name, _)| &**name == column)
            .map(|(_, value)| value)
    }

    /// Number of fields present in the record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no field
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for TypedRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(&**column, value)?;
        }
        map.end()
    }
}
