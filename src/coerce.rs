//! Leaf decoding: coerce wire values into typed fields.
//!
//! Wire values only carry the JSON type set, so numbers arrive as strings,
//! booleans as numbers and timestamps as strings often enough that decoding
//! is lenient in the documented ways below and strict everywhere else.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::CoerceError;
use crate::fields::FieldMeta;
use crate::types::{json_type_name, TimeFormat};

/// A value that can be decoded from an attribute.
pub trait FromAttribute: Sized {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError>;
}

fn shape(expected: &'static str, value: &Value) -> CoerceError {
    match value {
        Value::Null => CoerceError::Null { expected },
        other => CoerceError::Shape {
            expected,
            actual: json_type_name(other),
        },
    }
}

fn invalid(expected: &'static str, value: impl ToString) -> CoerceError {
    CoerceError::Invalid {
        expected,
        value: value.to_string(),
    }
}

impl FromAttribute for String {
    fn from_attribute(value: &Value, _meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(shape("string", other)),
        }
    }
}

impl FromAttribute for Value {
    fn from_attribute(value: &Value, _meta: &FieldMeta) -> Result<Self, CoerceError> {
        Ok(value.clone())
    }
}

/// Integral numbers in range, or numeric strings.
macro_rules! integer_attribute {
    ($($ty:ty),* $(,)?) => {$(
        impl FromAttribute for $ty {
            fn from_attribute(value: &Value, _meta: &FieldMeta) -> Result<Self, CoerceError> {
                const EXPECTED: &str = stringify!($ty);
                match value {
                    Value::Number(n) => {
                        let wide = if let Some(i) = n.as_i64() {
                            i128::from(i)
                        } else if let Some(u) = n.as_u64() {
                            i128::from(u)
                        } else {
                            match n.as_f64() {
                                Some(f) if f.fract() == 0.0 && f.is_finite() => f as i128,
                                _ => return Err(invalid(EXPECTED, n)),
                            }
                        };
                        <$ty>::try_from(wide).map_err(|_| invalid(EXPECTED, n))
                    }
                    Value::String(s) => s.trim().parse::<$ty>().map_err(|_| invalid(EXPECTED, s)),
                    other => Err(shape(EXPECTED, other)),
                }
            }
        }
    )*};
}

integer_attribute!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl FromAttribute for f64 {
    fn from_attribute(value: &Value, _meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| invalid("f64", n)),
            Value::String(s) => s.trim().parse().map_err(|_| invalid("f64", s)),
            other => Err(shape("f64", other)),
        }
    }
}

impl FromAttribute for f32 {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        let wide = f64::from_attribute(value, meta)?;
        let narrow = wide as f32;
        if wide.is_finite() && !narrow.is_finite() {
            return Err(invalid("f32", wide));
        }
        Ok(narrow)
    }
}

/// Booleans, numbers (zero is false), and `true/false/1/0/on/off` in any case.
impl FromAttribute for bool {
    fn from_attribute(value: &Value, _meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(true),
                "false" | "0" | "off" => Ok(false),
                _ => Err(invalid("bool", s)),
            },
            other => Err(shape("bool", other)),
        }
    }
}

impl<T: FromAttribute> FromAttribute for Option<T> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_attribute(other, meta).map(Some),
        }
    }
}

impl<T: FromAttribute> FromAttribute for Box<T> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        T::from_attribute(value, meta).map(Box::new)
    }
}

impl<T: FromAttribute> FromAttribute for Vec<T> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Array(items) => items.iter().map(|v| T::from_attribute(v, meta)).collect(),
            other => Err(shape("array", other)),
        }
    }
}

impl<T: FromAttribute> FromAttribute for HashMap<String, T> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_attribute(v, meta)?)))
                .collect(),
            other => Err(shape("object", other)),
        }
    }
}

impl<T: FromAttribute> FromAttribute for BTreeMap<String, T> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_attribute(v, meta)?)))
                .collect(),
            other => Err(shape("object", other)),
        }
    }
}

/// Parse `value` with `format`. Layouts without an offset are taken as UTC.
pub fn parse_moment(value: &str, format: TimeFormat) -> Result<DateTime<FixedOffset>, CoerceError> {
    let time_error = |source| CoerceError::Time {
        value: value.to_string(),
        source,
    };
    let utc = |naive: NaiveDateTime| -> DateTime<FixedOffset> { Utc.from_utc_datetime(&naive).into() };

    match format {
        TimeFormat::Rfc3339 => DateTime::parse_from_rfc3339(value).map_err(time_error),
        TimeFormat::DateOnly => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|date| utc(date.and_time(NaiveTime::default())))
            .map_err(time_error),
        TimeFormat::TimeOnly => NaiveTime::parse_from_str(value, "%H:%M:%S")
            .map(|time| utc(NaiveDate::default().and_time(time)))
            .map_err(time_error),
        TimeFormat::DateTime => NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .map(utc)
            .map_err(time_error),
        TimeFormat::Pattern(pattern) => DateTime::parse_from_str(value, pattern)
            .or_else(|zoned| {
                NaiveDateTime::parse_from_str(value, pattern)
                    .map(utc)
                    .or_else(|_| {
                        NaiveDate::parse_from_str(value, pattern)
                            .map(|date| utc(date.and_time(NaiveTime::default())))
                    })
                    .map_err(|_| zoned)
            })
            .map_err(time_error),
    }
}

/// Shared string handling for temporal leaves: the empty string decodes to
/// the default value.
fn temporal<T: Default>(
    value: &Value,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Result<T, CoerceError>,
) -> Result<T, CoerceError> {
    match value {
        Value::String(s) if s.is_empty() => Ok(T::default()),
        Value::String(s) => parse(s),
        other => Err(shape(expected, other)),
    }
}

impl FromAttribute for DateTime<FixedOffset> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        temporal(value, "timestamp", |s| {
            parse_moment(s, meta.time_format.unwrap_or(TimeFormat::Rfc3339))
        })
    }
}

impl FromAttribute for DateTime<Utc> {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        temporal(value, "timestamp", |s| {
            parse_moment(s, meta.time_format.unwrap_or(TimeFormat::Rfc3339))
                .map(|moment| moment.with_timezone(&Utc))
        })
    }
}

fn naive<T: std::str::FromStr<Err = chrono::ParseError> + Default>(
    value: &Value,
    meta: &FieldMeta,
    expected: &'static str,
    from_moment: impl FnOnce(NaiveDateTime) -> T,
) -> Result<T, CoerceError> {
    temporal(value, expected, |s| match meta.time_format {
        Some(format) => parse_moment(s, format).map(|moment| from_moment(moment.naive_local())),
        None => s.parse().map_err(|source| CoerceError::Time {
            value: s.to_string(),
            source,
        }),
    })
}

impl FromAttribute for NaiveDateTime {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        naive(value, meta, "datetime", |moment| moment)
    }
}

impl FromAttribute for NaiveDate {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        naive(value, meta, "date", |moment| moment.date())
    }
}

impl FromAttribute for NaiveTime {
    fn from_attribute(value: &Value, meta: &FieldMeta) -> Result<Self, CoerceError> {
        naive(value, meta, "time", |moment| moment.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAIN: FieldMeta = FieldMeta::new("value");

    fn decode<T: FromAttribute>(value: Value) -> Result<T, CoerceError> {
        T::from_attribute(&value, &PLAIN)
    }

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(decode::<i32>(json!("42")).unwrap(), 42);
        assert_eq!(decode::<u8>(json!(" 7 ")).unwrap(), 7);
        assert_eq!(decode::<f64>(json!("1.5")).unwrap(), 1.5);
        assert_eq!(decode::<i64>(json!(36.0)).unwrap(), 36);
    }

    #[test]
    fn integers_reject_fractions_and_overflow() {
        assert!(matches!(
            decode::<i32>(json!(1.5)),
            Err(CoerceError::Invalid { .. })
        ));
        assert!(matches!(
            decode::<u8>(json!(300)),
            Err(CoerceError::Invalid { .. })
        ));
        assert!(matches!(
            decode::<u8>(json!(-1)),
            Err(CoerceError::Invalid { .. })
        ));
        assert!(matches!(
            decode::<i32>(json!("forty")),
            Err(CoerceError::Invalid { .. })
        ));
    }

    #[test]
    fn f32_rejects_values_out_of_range() {
        assert_eq!(decode::<f32>(json!(1.5)).unwrap(), 1.5);
        assert_eq!(decode::<f32>(json!("-2.25")).unwrap(), -2.25);
        let err = decode::<f32>(json!(1e300)).unwrap_err();
        assert!(matches!(err, CoerceError::Invalid { expected: "f32", .. }));
        assert!(decode::<f32>(json!("-1e39")).is_err());
    }

    #[test]
    fn bool_coercions() {
        assert!(decode::<bool>(json!(true)).unwrap());
        assert!(decode::<bool>(json!(2)).unwrap());
        assert!(!decode::<bool>(json!(0)).unwrap());
        assert!(decode::<bool>(json!("ON")).unwrap());
        assert!(decode::<bool>(json!("1")).unwrap());
        assert!(!decode::<bool>(json!("False")).unwrap());
        assert!(!decode::<bool>(json!("off")).unwrap());
        assert!(!decode::<bool>(json!("0")).unwrap());
        assert!(decode::<bool>(json!("yes")).is_err());
    }

    #[test]
    fn null_needs_option() {
        assert!(matches!(
            decode::<String>(json!(null)),
            Err(CoerceError::Null { .. })
        ));
        assert_eq!(decode::<Option<String>>(json!(null)).unwrap(), None);
        assert_eq!(
            decode::<Option<String>>(json!("x")).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn shape_mismatch_names_types() {
        let err = decode::<String>(json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "expected string, got array");
    }

    #[test]
    fn collections_coerce_elements() {
        assert_eq!(decode::<Vec<i32>>(json!(["1", 2])).unwrap(), vec![1, 2]);

        let map = decode::<HashMap<String, i64>>(json!({"a": 1, "b": "2"})).unwrap();
        assert_eq!(map["b"], 2);

        let map = decode::<BTreeMap<String, bool>>(json!({"x": "on"})).unwrap();
        assert!(map["x"]);
    }

    #[test]
    fn rfc3339_by_default() {
        let moment = decode::<DateTime<Utc>>(json!("1985-06-15T12:13:59+02:00")).unwrap();
        assert_eq!(moment.to_rfc3339(), "1985-06-15T10:13:59+00:00");
    }

    #[test]
    fn empty_string_is_default_time() {
        let moment = decode::<DateTime<Utc>>(json!("")).unwrap();
        assert_eq!(moment, DateTime::<Utc>::default());
        assert_eq!(decode::<NaiveDate>(json!("")).unwrap(), NaiveDate::default());
    }

    #[test]
    fn format_hints() {
        let date_only = FieldMeta::new("d").time_format(TimeFormat::DateOnly);
        let moment = DateTime::<Utc>::from_attribute(&json!("2024-02-29"), &date_only).unwrap();
        assert_eq!(moment.to_rfc3339(), "2024-02-29T00:00:00+00:00");

        let time_only = FieldMeta::new("t").time_format(TimeFormat::TimeOnly);
        let time = NaiveTime::from_attribute(&json!("08:30:00"), &time_only).unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());

        let date_time = FieldMeta::new("dt").time_format(TimeFormat::DateTime);
        let naive = NaiveDateTime::from_attribute(&json!("2024-01-02 03:04:05"), &date_time).unwrap();
        assert_eq!(naive.to_string(), "2024-01-02 03:04:05");

        let pattern = FieldMeta::new("p").time_format(TimeFormat::Pattern("%d.%m.%Y"));
        let date = NaiveDate::from_attribute(&json!("15.06.1985"), &pattern).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1985, 6, 15).unwrap());
    }

    #[test]
    fn naive_types_default_to_iso() {
        assert_eq!(
            decode::<NaiveDate>(json!("1985-06-15")).unwrap(),
            NaiveDate::from_ymd_opt(1985, 6, 15).unwrap()
        );
        assert!(matches!(
            decode::<NaiveDate>(json!("15/06/1985")),
            Err(CoerceError::Time { .. })
        ));
    }

    #[test]
    fn invalid_time_reports_value() {
        let err = decode::<DateTime<FixedOffset>>(json!("yesterday")).unwrap_err();
        assert!(err.to_string().starts_with("cannot parse time \"yesterday\""));
    }
}
