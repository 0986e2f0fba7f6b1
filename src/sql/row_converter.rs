/// Value coercion - converts literal values to a column's declared type

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{EngineError, Result};
use crate::types::{ColumnDef, ColumnType, Value};

/// Coerce `value` to the declared type of `column`.
///
/// Total over every (value, type) pair: the result is either a value of the
/// column's type, `Null`, or a `Type` error. NOT NULL is enforced separately
/// because missing values may still fall back to a default.
pub fn validate_and_convert(value: &Value, column: &ColumnDef) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let converted = match column.data_type {
        ColumnType::Integer => to_integer(value),
        ColumnType::Real => to_real(value),
        ColumnType::Text => Some(Value::Text(value.to_string())),
        ColumnType::Boolean => to_boolean(value),
        ColumnType::Date => to_date(value),
    };

    converted.ok_or_else(|| type_error(value, column))
}

fn type_error(value: &Value, column: &ColumnDef) -> EngineError {
    let shown = match value {
        Value::Text(s) | Value::Date(s) => format!("'{}'", s),
        other => other.to_string(),
    };
    EngineError::Type {
        column: column.name.clone(),
        value: shown,
        expected: column.data_type.to_string(),
    }
}

/// Reals and numeric strings are floored
fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Integer(*i)),
        Value::Bool(b) => Some(Value::Integer(i64::from(*b))),
        Value::Real(_) | Value::Text(_) => {
            let f = value.as_f64()?.floor();
            if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(Value::Integer(f as i64))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn to_real(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Real(if *b { 1.0 } else { 0.0 })),
        Value::Date(_) => None,
        other => other.as_f64().map(Value::Real),
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Integer(1) => Some(Value::Bool(true)),
        Value::Integer(0) => Some(Value::Bool(false)),
        Value::Real(f) if *f == 1.0 => Some(Value::Bool(true)),
        Value::Real(f) if *f == 0.0 => Some(Value::Bool(false)),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Strings parse as dates, integers as epoch milliseconds
fn to_date(value: &Value) -> Option<Value> {
    let parsed = match value {
        Value::Text(s) | Value::Date(s) => parse_date(s),
        Value::Integer(ms) => Utc.timestamp_millis_opt(*ms).single(),
        Value::Real(ms) if ms.is_finite() => Utc.timestamp_millis_opt(ms.trunc() as i64).single(),
        _ => None,
    }?;
    Some(Value::Date(format_date(&parsed)))
}

/// Parse the accepted date spellings into UTC
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// ISO-8601 with millisecond precision, e.g. 2024-01-31T00:00:00.000Z
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data_type: ColumnType) -> ColumnDef {
        ColumnDef::new("c", data_type)
    }

    #[test]
    fn test_integer_coercion() {
        let c = col(ColumnType::Integer);
        assert_eq!(validate_and_convert(&Value::Integer(7), &c).unwrap(), Value::Integer(7));
        assert_eq!(validate_and_convert(&Value::Real(2.9), &c).unwrap(), Value::Integer(2));
        assert_eq!(validate_and_convert(&Value::Real(-2.1), &c).unwrap(), Value::Integer(-3));
        assert_eq!(validate_and_convert(&Value::Text("42".into()), &c).unwrap(), Value::Integer(42));
        assert_eq!(validate_and_convert(&Value::Text("4.5".into()), &c).unwrap(), Value::Integer(4));
        assert!(matches!(
            validate_and_convert(&Value::Text("abc".into()), &c),
            Err(EngineError::Type { .. })
        ));
        assert!(validate_and_convert(&Value::Date("2024-01-01".into()), &c).is_err());
    }

    #[test]
    fn test_real_and_text_coercion() {
        assert_eq!(
            validate_and_convert(&Value::Integer(3), &col(ColumnType::Real)).unwrap(),
            Value::Real(3.0)
        );
        assert_eq!(
            validate_and_convert(&Value::Text(" 1.25 ".into()), &col(ColumnType::Real)).unwrap(),
            Value::Real(1.25)
        );
        assert!(validate_and_convert(&Value::Text("x".into()), &col(ColumnType::Real)).is_err());
        assert_eq!(
            validate_and_convert(&Value::Integer(5), &col(ColumnType::Text)).unwrap(),
            Value::Text("5".into())
        );
        assert_eq!(
            validate_and_convert(&Value::Bool(true), &col(ColumnType::Text)).unwrap(),
            Value::Text("true".into())
        );
    }

    #[test]
    fn test_boolean_coercion() {
        let c = col(ColumnType::Boolean);
        assert_eq!(validate_and_convert(&Value::Text("TRUE".into()), &c).unwrap(), Value::Bool(true));
        assert_eq!(validate_and_convert(&Value::Text("false".into()), &c).unwrap(), Value::Bool(false));
        assert_eq!(validate_and_convert(&Value::Integer(1), &c).unwrap(), Value::Bool(true));
        assert_eq!(validate_and_convert(&Value::Integer(0), &c).unwrap(), Value::Bool(false));
        assert!(validate_and_convert(&Value::Integer(2), &c).is_err());
        assert!(validate_and_convert(&Value::Text("yes".into()), &c).is_err());
    }

    #[test]
    fn test_date_coercion() {
        let c = col(ColumnType::Date);
        assert_eq!(
            validate_and_convert(&Value::Text("2024-01-31".into()), &c).unwrap(),
            Value::Date("2024-01-31T00:00:00.000Z".into())
        );
        assert_eq!(
            validate_and_convert(&Value::Text("2024-01-31 12:30:00".into()), &c).unwrap(),
            Value::Date("2024-01-31T12:30:00.000Z".into())
        );
        assert_eq!(
            validate_and_convert(&Value::Text("2024-01-31T12:30:00+02:00".into()), &c).unwrap(),
            Value::Date("2024-01-31T10:30:00.000Z".into())
        );
        assert_eq!(
            validate_and_convert(&Value::Integer(0), &c).unwrap(),
            Value::Date("1970-01-01T00:00:00.000Z".into())
        );
        match validate_and_convert(&Value::Text("not a date".into()), &c) {
            Err(EngineError::Type { column, expected, .. }) => {
                assert_eq!(column, "c");
                assert_eq!(expected, "DATE");
            }
            other => panic!("Expected type error, got {:?}", other),
        }
        assert!(validate_and_convert(&Value::Bool(true), &c).is_err());
    }

    #[test]
    fn test_null_passes_every_type() {
        for t in [
            ColumnType::Integer,
            ColumnType::Real,
            ColumnType::Text,
            ColumnType::Boolean,
            ColumnType::Date,
        ] {
            assert_eq!(validate_and_convert(&Value::Null, &col(t).not_null()).unwrap(), Value::Null);
        }
    }
}
