//! Tolerant deserializers for loosely-typed server JSON.
//!
//! The clinic API stores ids as integers or strings, and numbers that were
//! typed into forms often arrive as strings ("5", "5,5").

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Id as string, accepting numbers. `null` becomes an empty string.
pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_id(&Value::deserialize(d)?).unwrap_or_default())
}

/// Optional id, accepting numbers.
pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_id(&Value::deserialize(d)?))
}

/// String field, `null` becomes empty and scalars are stringified.
pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?).unwrap_or_default())
}

/// Optional string; empty strings are treated as absent.
pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?).filter(|s| !s.trim().is_empty()))
}

/// Optional number, accepting numeric strings.
pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(value_to_f64(&Value::deserialize(d)?))
}

pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a user-typed number, accepting a comma decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_numbers() {
        assert_eq!(value_to_id(&json!(42)), Some("42".into()));
        assert_eq!(value_to_id(&json!("abc")), Some("abc".into()));
        assert_eq!(value_to_id(&json!(null)), None);
        assert_eq!(value_to_id(&json!("")), None);
    }

    #[test]
    fn test_numbers_accept_strings() {
        assert_eq!(value_to_f64(&json!("5")), Some(5.0));
        assert_eq!(value_to_f64(&json!("5,5")), Some(5.5));
        assert_eq!(value_to_f64(&json!(70)), Some(70.0));
        assert_eq!(value_to_f64(&json!("abc")), None);
        assert_eq!(value_to_f64(&json!([])), None);
    }

    #[test]
    fn test_parse_number_blank() {
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
    }
}
