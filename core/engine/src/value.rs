//! FILENAME: core/engine/src/value.rs
//! PURPOSE: The dynamically typed value carried by coordinates, columns and cells.
//! CONTEXT: `CubeValue` is what callers put into a coordinate, what columns
//! wrap, and what cells return. `ValueType` is an axis's declared type and
//! knows how to promote loosely typed input (text from JSON, integral
//! doubles, epoch millis) into that type before matching.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as Json};

use crate::error::{CubeError, CubeResult};

// ============================================================================
// POINT
// ============================================================================

/// A position used by NEAREST axes over COMPARABLE values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Point {
    Xy { x: f64, y: f64 },
    Xyz { x: f64, y: f64, z: f64 },
    /// Geographic position in degrees.
    LatLon { lat: f64, lon: f64 },
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Xy { x, y } => write!(f, "({}, {})", x, y),
            Point::Xyz { x, y, z } => write!(f, "({}, {}, {})", x, y, z),
            Point::LatLon { lat, lon } => write!(f, "({}°, {}°)", lat, lon),
        }
    }
}

// ============================================================================
// CUBE VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CubeValue {
    #[default]
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
    Date(NaiveDateTime),
    Point(Point),
    List(Vec<CubeValue>),
    Map(BTreeMap<String, CubeValue>),
}

impl CubeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CubeValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CubeValue::Long(_) | CubeValue::Double(_))
    }

    /// Truthiness used for rule conditions: null, false, zero, NaN and
    /// empty text/collections are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            CubeValue::Null => false,
            CubeValue::Bool(b) => *b,
            CubeValue::Long(n) => *n != 0,
            CubeValue::Double(n) => *n != 0.0 && !n.is_nan(),
            CubeValue::Text(s) => !s.is_empty(),
            CubeValue::Date(_) | CubeValue::Point(_) => true,
            CubeValue::List(items) => !items.is_empty(),
            CubeValue::Map(entries) => !entries.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CubeValue::Long(n) => Some(*n as f64),
            CubeValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CubeValue::Long(n) => Some(*n),
            CubeValue::Double(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CubeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CubeValue::Null => "null",
            CubeValue::Bool(_) => "boolean",
            CubeValue::Long(_) => "long",
            CubeValue::Double(_) => "double",
            CubeValue::Text(_) => "string",
            CubeValue::Date(_) => "date",
            CubeValue::Point(_) => "point",
            CubeValue::List(_) => "list",
            CubeValue::Map(_) => "map",
        }
    }

    /// Ordering used by axes: numbers compare across long/double, text
    /// compares case-insensitively. Returns None for incomparable pairs.
    pub fn compare(&self, other: &CubeValue) -> Option<Ordering> {
        self.compare_with(other, true)
    }

    pub fn compare_with(&self, other: &CubeValue, ignore_case: bool) -> Option<Ordering> {
        match (self, other) {
            (CubeValue::Long(a), CubeValue::Long(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64()?, b.as_f64()?);
                a.partial_cmp(&b)
            }
            (CubeValue::Text(a), CubeValue::Text(b)) => {
                if ignore_case {
                    Some(compare_ignore_case(a, b))
                } else {
                    Some(a.cmp(b))
                }
            }
            (CubeValue::Date(a), CubeValue::Date(b)) => Some(a.cmp(b)),
            (CubeValue::Bool(a), CubeValue::Bool(b)) => Some(a.cmp(b)),
            (CubeValue::Null, CubeValue::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Equality used by expressions: numbers are equal across long/double.
    pub fn loose_eq(&self, other: &CubeValue) -> bool {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            (CubeValue::List(a), CubeValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (a, b) => a == b,
        }
    }

    // ------------------------------------------------------------------
    // JSON conversion
    // ------------------------------------------------------------------

    /// Converts JSON without type hints: integers become Long, other numbers Double.
    pub fn from_json(json: &Json) -> CubeValue {
        match json {
            Json::Null => CubeValue::Null,
            Json::Bool(b) => CubeValue::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => CubeValue::Long(i),
                None => CubeValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => CubeValue::Text(s.clone()),
            Json::Array(items) => CubeValue::List(items.iter().map(CubeValue::from_json).collect()),
            Json::Object(entries) => CubeValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), CubeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            CubeValue::Null => Json::Null,
            CubeValue::Bool(b) => Json::Bool(*b),
            CubeValue::Long(n) => Json::Number((*n).into()),
            CubeValue::Double(n) => JsonNumber::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
            CubeValue::Text(s) => Json::String(s.clone()),
            CubeValue::Date(d) => Json::String(format_date(d)),
            CubeValue::Point(p) => point_to_json(p),
            CubeValue::List(items) => Json::Array(items.iter().map(CubeValue::to_json).collect()),
            CubeValue::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<JsonMap<String, Json>>(),
            ),
        }
    }
}

impl fmt::Display for CubeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CubeValue::Null => write!(f, "null"),
            CubeValue::Bool(b) => write!(f, "{}", b),
            CubeValue::Long(n) => write!(f, "{}", n),
            CubeValue::Double(n) => write!(f, "{}", n),
            CubeValue::Text(s) => write!(f, "{}", s),
            CubeValue::Date(d) => write!(f, "{}", format_date(d)),
            CubeValue::Point(p) => write!(f, "{}", p),
            CubeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            CubeValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for CubeValue {
    fn from(value: bool) -> Self {
        CubeValue::Bool(value)
    }
}

impl From<i64> for CubeValue {
    fn from(value: i64) -> Self {
        CubeValue::Long(value)
    }
}

impl From<i32> for CubeValue {
    fn from(value: i32) -> Self {
        CubeValue::Long(value as i64)
    }
}

impl From<f64> for CubeValue {
    fn from(value: f64) -> Self {
        CubeValue::Double(value)
    }
}

impl From<&str> for CubeValue {
    fn from(value: &str) -> Self {
        CubeValue::Text(value.to_string())
    }
}

impl From<String> for CubeValue {
    fn from(value: String) -> Self {
        CubeValue::Text(value)
    }
}

impl From<NaiveDateTime> for CubeValue {
    fn from(value: NaiveDateTime) -> Self {
        CubeValue::Date(value)
    }
}

impl From<NaiveDate> for CubeValue {
    fn from(value: NaiveDate) -> Self {
        CubeValue::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Point> for CubeValue {
    fn from(value: Point) -> Self {
        CubeValue::Point(value)
    }
}

impl<T: Into<CubeValue>> From<Vec<T>> for CubeValue {
    fn from(value: Vec<T>) -> Self {
        CubeValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Case-insensitive ordering without allocating for ASCII-only input.
fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        a.bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
    } else {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
}

// ============================================================================
// DATES
// ============================================================================

pub fn format_date(date: &NaiveDateTime) -> String {
    if date.time() == chrono::NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Parses ISO-8601 style dates: `2024-03-01`, `2024-03-01T10:15:00`,
/// `2024-03-01 10:15:00` and RFC 3339 with offsets (converted to UTC).
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d.and_time(chrono::NaiveTime::MIN));
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_utc())
}

fn point_to_json(point: &Point) -> Json {
    let mut map = JsonMap::new();
    let mut put = |key: &str, v: f64| {
        map.insert(
            key.to_string(),
            JsonNumber::from_f64(v).map(Json::Number).unwrap_or(Json::Null),
        );
    };
    match point {
        Point::Xy { x, y } => {
            put("x", *x);
            put("y", *y);
        }
        Point::Xyz { x, y, z } => {
            put("x", *x);
            put("y", *y);
            put("z", *z);
        }
        Point::LatLon { lat, lon } => {
            put("lat", *lat);
            put("lon", *lon);
        }
    }
    Json::Object(map)
}

/// Reads a point from `{x, y}`, `{x, y, z}`, `{lat, lon}` maps or a list of 2-3 numbers.
pub fn point_from_value(value: &CubeValue) -> Option<Point> {
    match value {
        CubeValue::Point(p) => Some(*p),
        CubeValue::List(items) => {
            let nums: Option<Vec<f64>> = items.iter().map(CubeValue::as_f64).collect();
            match nums?.as_slice() {
                [x, y] => Some(Point::Xy { x: *x, y: *y }),
                [x, y, z] => Some(Point::Xyz { x: *x, y: *y, z: *z }),
                _ => None,
            }
        }
        CubeValue::Map(entries) => {
            let get = |k: &str| entries.get(k).and_then(CubeValue::as_f64);
            if let (Some(lat), Some(lon)) = (get("lat"), get("lon")) {
                return Some(Point::LatLon { lat, lon });
            }
            match (get("x"), get("y"), get("z")) {
                (Some(x), Some(y), Some(z)) => Some(Point::Xyz { x, y, z }),
                (Some(x), Some(y), None) => Some(Point::Xy { x, y }),
                _ => None,
            }
        }
        _ => None,
    }
}

// ============================================================================
// VALUE TYPE
// ============================================================================

/// The declared type of an axis's column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    Long,
    /// Stored and compared as a double.
    Decimal,
    Double,
    Date,
    /// Rule conditions; only valid on RULE axes.
    Expression,
    /// Any self-comparable value, including points for NEAREST axes.
    Comparable,
}

impl ValueType {
    /// Converts `value` to this type. Input that cannot represent a value of
    /// this type is an `InvalidCoordinate` error.
    pub fn promote(&self, value: &CubeValue) -> CubeResult<CubeValue> {
        let promoted = match (self, value) {
            (_, CubeValue::Null) => Some(CubeValue::Null),

            (ValueType::String, CubeValue::Text(_)) => Some(value.clone()),
            (ValueType::String, CubeValue::Long(_))
            | (ValueType::String, CubeValue::Double(_))
            | (ValueType::String, CubeValue::Bool(_))
            | (ValueType::String, CubeValue::Date(_)) => Some(CubeValue::Text(value.to_string())),

            (ValueType::Long, CubeValue::Long(_)) => Some(value.clone()),
            (ValueType::Long, CubeValue::Double(n)) => Some(match value.as_i64() {
                Some(i) => CubeValue::Long(i),
                None => CubeValue::Double(*n),
            }),
            (ValueType::Long, CubeValue::Text(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(CubeValue::Long)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(CubeValue::Double))
            }

            (ValueType::Double | ValueType::Decimal, v) if v.is_numeric() => {
                v.as_f64().map(CubeValue::Double)
            }
            (ValueType::Double | ValueType::Decimal, CubeValue::Text(s)) => {
                s.trim().parse::<f64>().ok().map(CubeValue::Double)
            }

            (ValueType::Date, CubeValue::Date(_)) => Some(value.clone()),
            (ValueType::Date, CubeValue::Text(s)) => parse_date(s).map(CubeValue::Date),
            (ValueType::Date, CubeValue::Long(millis)) => {
                DateTime::from_timestamp_millis(*millis).map(|dt| CubeValue::Date(dt.naive_utc()))
            }

            (ValueType::Expression, _) => Some(value.clone()),

            (ValueType::Comparable, CubeValue::List(_)) | (ValueType::Comparable, CubeValue::Map(_)) => {
                point_from_value(value).map(CubeValue::Point)
            }
            (ValueType::Comparable, _) => Some(value.clone()),

            _ => None,
        };

        promoted.ok_or_else(|| {
            CubeError::InvalidCoordinate(format!(
                "cannot convert {} '{}' to {:?}",
                value.type_name(),
                value,
                self
            ))
        })
    }

    /// Converts a JSON value to this type (used when loading definitions).
    pub fn from_json(&self, json: &Json) -> CubeResult<CubeValue> {
        self.promote(&CubeValue::from_json(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!CubeValue::Null.is_truthy());
        assert!(!CubeValue::Long(0).is_truthy());
        assert!(CubeValue::Long(-1).is_truthy());
        assert!(!CubeValue::Text(String::new()).is_truthy());
        assert!(CubeValue::Text("no".to_string()).is_truthy());
        assert!(!CubeValue::List(vec![]).is_truthy());
        assert!(!CubeValue::Double(f64::NAN).is_truthy());
    }

    #[test]
    fn test_compare_mixed_numbers_and_case() {
        assert_eq!(
            CubeValue::Long(2).compare(&CubeValue::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            CubeValue::from("ohio").compare(&CubeValue::from("OHIO")),
            Some(Ordering::Equal)
        );
        assert_eq!(
            CubeValue::from("ohio").compare_with(&CubeValue::from("OHIO"), false),
            Some(Ordering::Greater)
        );
        assert_eq!(CubeValue::from("a").compare(&CubeValue::Long(1)), None);
    }

    #[test]
    fn test_promote_long_axis_inputs() {
        assert_eq!(
            ValueType::Long.promote(&CubeValue::from("42")).unwrap(),
            CubeValue::Long(42)
        );
        assert_eq!(
            ValueType::Long.promote(&CubeValue::Double(7.0)).unwrap(),
            CubeValue::Long(7)
        );
        assert_eq!(
            ValueType::Long.promote(&CubeValue::Double(7.5)).unwrap(),
            CubeValue::Double(7.5)
        );
        assert!(ValueType::Long.promote(&CubeValue::from("seven")).is_err());
    }

    #[test]
    fn test_promote_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            ValueType::Date.promote(&CubeValue::from("2024-03-01")).unwrap(),
            CubeValue::from(expected)
        );
        assert_eq!(
            ValueType::Date.promote(&CubeValue::Long(0)).unwrap(),
            CubeValue::from(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert!(ValueType::Date.promote(&CubeValue::from("March")).is_err());
    }

    #[test]
    fn test_promote_points() {
        let v = CubeValue::from(vec![1.0, 2.0]);
        assert_eq!(
            ValueType::Comparable.promote(&v).unwrap(),
            CubeValue::Point(Point::Xy { x: 1.0, y: 2.0 })
        );
        let json = serde_json::json!({"lat": 40.0, "lon": -83.0});
        assert_eq!(
            ValueType::Comparable.from_json(&json).unwrap(),
            CubeValue::Point(Point::LatLon { lat: 40.0, lon: -83.0 })
        );
    }

    #[test]
    fn test_json_round_trip_keeps_integers() {
        let json = serde_json::json!({"a": 1, "b": 1.5, "c": ["x", null, true]});
        let value = CubeValue::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_display_dates() {
        let midnight = CubeValue::from(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(midnight.to_string(), "2024-01-02");
        let dt = parse_date("2024-01-02T03:04:05").unwrap();
        assert_eq!(CubeValue::Date(dt).to_string(), "2024-01-02T03:04:05");
    }
}
