//! Coerce caller-supplied JSON values to a column's semantic type.
//! Form input arrives stringly; "42" against an integer column binds 42.

use crate::schema::SemanticType;
use crate::sql::BindValue;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Coerce one value. Returns a human-readable reason on failure; the action
/// layer turns that into a per-column fault and keeps collecting.
pub fn coerce(value: &Value, ty: SemanticType) -> Result<BindValue, String> {
    if value.is_null() {
        return Ok(BindValue::Null);
    }
    match ty {
        SemanticType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .map(BindValue::I64)
                .ok_or_else(|| format!("{} is not an integer", n)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(BindValue::I64)
                .map_err(|_| format!("'{}' is not an integer", s)),
            other => Err(format!("{} cannot be an integer", kind_of(other))),
        },
        SemanticType::Decimal => match value {
            Value::Number(n) => n
                .as_f64()
                .map(BindValue::F64)
                .ok_or_else(|| format!("{} is not a number", n)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(BindValue::F64)
                .map_err(|_| format!("'{}' is not a number", s)),
            other => Err(format!("{} cannot be a number", kind_of(other))),
        },
        SemanticType::Text => match value {
            Value::String(s) => Ok(BindValue::String(s.clone())),
            Value::Number(n) => Ok(BindValue::String(n.to_string())),
            Value::Bool(b) => Ok(BindValue::String(b.to_string())),
            other => Err(format!("{} cannot be text", kind_of(other))),
        },
        SemanticType::Boolean => match value {
            Value::Bool(b) => Ok(BindValue::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "on" => Ok(BindValue::Bool(true)),
                "false" | "f" | "0" | "no" | "off" => Ok(BindValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", s)),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(BindValue::Bool(false)),
                Some(1) => Ok(BindValue::Bool(true)),
                _ => Err(format!("{} is not a boolean", n)),
            },
            other => Err(format!("{} cannot be a boolean", kind_of(other))),
        },
        SemanticType::Timestamp => match value {
            Value::String(s) => parse_timestamp(s)
                .map(BindValue::Timestamp)
                .ok_or_else(|| format!("'{}' is not an ISO-8601 timestamp", s)),
            other => Err(format!("{} cannot be a timestamp", kind_of(other))),
        },
        SemanticType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(BindValue::Date)
                .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", s)),
            other => Err(format!("{} cannot be a date", kind_of(other))),
        },
        SemanticType::Uuid => match value {
            Value::String(s) => uuid::Uuid::parse_str(s.trim())
                .map(BindValue::Uuid)
                .map_err(|_| format!("'{}' is not a UUID", s)),
            other => Err(format!("{} cannot be a UUID", kind_of(other))),
        },
        SemanticType::Json => Ok(BindValue::Json(value.clone())),
        SemanticType::Unknown => Ok(BindValue::from_json(value)),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    None
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_become_integers() {
        assert!(matches!(
            coerce(&json!("42"), SemanticType::Integer),
            Ok(BindValue::I64(42))
        ));
        assert!(matches!(
            coerce(&json!(42), SemanticType::Integer),
            Ok(BindValue::I64(42))
        ));
    }

    #[test]
    fn bad_integer_reports_reason() {
        let err = coerce(&json!("forty-two"), SemanticType::Integer).unwrap_err();
        assert!(err.contains("forty-two"));
    }

    #[test]
    fn iso_strings_become_timestamps() {
        // The form-prefill format (no seconds) must parse too.
        assert!(coerce(&json!("2024-05-01T12:30"), SemanticType::Timestamp).is_ok());
        assert!(coerce(&json!("2024-05-01T12:30:15"), SemanticType::Timestamp).is_ok());
        assert!(coerce(&json!("2024-05-01T12:30:15Z"), SemanticType::Timestamp).is_ok());
        assert!(coerce(&json!("not a time"), SemanticType::Timestamp).is_err());
    }

    #[test]
    fn booleans_accept_form_spellings() {
        assert!(matches!(
            coerce(&json!("1"), SemanticType::Boolean),
            Ok(BindValue::Bool(true))
        ));
        assert!(matches!(
            coerce(&json!("off"), SemanticType::Boolean),
            Ok(BindValue::Bool(false))
        ));
    }

    #[test]
    fn null_passes_through_every_type() {
        for ty in [
            SemanticType::Integer,
            SemanticType::Text,
            SemanticType::Timestamp,
            SemanticType::Unknown,
        ] {
            assert!(matches!(coerce(&Value::Null, ty), Ok(BindValue::Null)));
        }
    }

    #[test]
    fn unknown_type_never_rejects() {
        for v in [json!("x"), json!(1), json!(true), json!({"k": 1}), json!([1])] {
            assert!(coerce(&v, SemanticType::Unknown).is_ok());
        }
    }
}
