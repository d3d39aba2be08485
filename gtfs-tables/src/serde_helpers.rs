use chrono::NaiveDate;
use log::warn;
use serde::de::{self, Deserialize, DeserializeOwned, Deserializer};
use url::Url;

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err("YYYYMMDD format is expected".to_owned());
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| e.to_string())
}

pub fn parse_integer(s: &str) -> Result<i64, String> {
    s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
}

pub fn parse_float(s: &str) -> Result<f64, String> {
    let f: f64 = s
        .parse()
        .map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if f.is_finite() {
        Ok(f)
    } else {
        Err("not a finite number".to_owned())
    }
}

pub fn parse_url(s: &str) -> Result<Url, String> {
    Url::parse(s).map_err(|e| e.to_string())
}

/// Scalars as they appear in the realtime JSON: the same field can be a number in one
/// producer and a string in another
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Unsigned(u) => u.to_string(),
            Scalar::Signed(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }

    fn into_u64<E: de::Error>(self) -> Result<u64, E> {
        match self {
            Scalar::Unsigned(u) => Ok(u),
            Scalar::Signed(i) => u64::try_from(i).map_err(de::Error::custom),
            Scalar::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
            Scalar::Float(f) => Err(de::Error::custom(format!("{f} is not a whole number"))),
            Scalar::Text(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }

    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            Scalar::Unsigned(u) => Ok(u as f64),
            Scalar::Signed(i) => Ok(i as f64),
            Scalar::Float(f) => Ok(f),
            Scalar::Text(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }
}

/// Identifiers: `830` and `"830"` both give `"830"`
pub fn de_string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(de).map(Scalar::into_string)
}

pub fn de_option_string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(de).map(|opt| opt.map(Scalar::into_string))
}

/// Timestamps: protobuf-to-JSON encoders write 64 bits integers as strings
pub fn de_lenient_u64<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(de).and_then(Scalar::into_u64)
}

pub fn de_option_lenient_u64<'de, D>(de: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(de)? {
        None => Ok(None),
        Some(Scalar::Text(s)) if s.is_empty() => Ok(None),
        Some(scalar) => Ok(scalar
            .into_u64::<D::Error>()
            .map_err(|e| warn!("Ignoring malformed integer: {e}"))
            .ok()),
    }
}

pub fn de_lenient_f64<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(de).and_then(Scalar::into_f64)
}

pub fn de_option_lenient_f64<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(de)? {
        None => Ok(None),
        Some(Scalar::Text(s)) if s.is_empty() => Ok(None),
        Some(scalar) => Ok(scalar
            .into_f64::<D::Error>()
            .map_err(|e| warn!("Ignoring malformed number: {e}"))
            .ok()),
    }
}

/// Enumerations are either their ordinal or their protobuf name
#[derive(Deserialize)]
#[serde(untagged)]
pub enum OrdinalOrLabel {
    Ordinal(i32),
    Label(String),
}

/// Nested realtime values drift between producers: a malformed one becomes `None`
/// (with a warning) instead of failing the whole document
pub fn de_option_or_warn<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring malformed {}: {e}", std::any::type_name::<T>());
            None
        }
    }))
}

/// Like [de_option_or_warn], falling back to the default value
pub fn de_or_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    de_option_or_warn(de).map(Option::unwrap_or_default)
}

/// Keeps the elements that can be read, logs how many were dropped
pub fn de_skip_malformed<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Vec::<serde_json::Value>::deserialize(de)?;
    let total = values.len();
    let mut first_error = None;
    let items: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                first_error.get_or_insert(e);
                None
            }
        })
        .collect();

    if let Some(e) = first_error {
        warn!(
            "Dropped {} malformed {} out of {total}, first: {e}",
            total - items.len(),
            std::any::type_name::<T>()
        );
    }
    Ok(items)
}

pub fn is_false(b: &bool) -> bool {
    !*b
}

#[test]
fn test_parse_date() {
    assert_eq!(
        Ok(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
        parse_date("20240115")
    );
    assert!(parse_date("20241301").is_err());
    assert!(parse_date("2024-01-15").is_err());
    assert!(parse_date("2024115").is_err());
}
