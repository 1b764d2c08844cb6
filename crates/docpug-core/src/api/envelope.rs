//! Decoding of the `{ok, data?, error?}` response envelope.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{ApiError, ApiResult};

/// Error text used when the server says `ok: false` without a message.
const DEFAULT_REJECTION: &str = "Request was rejected by the server";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Check status and envelope, returning the `data` member (if any).
pub fn parse_envelope(status: u16, body: &str) -> ApiResult<Option<Value>> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Status {
            status,
            body: body.to_string(),
        });
    }

    if body.trim().is_empty() {
        return Err(ApiError::MalformedBody("empty body".to_string()));
    }

    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    if !envelope.ok {
        let message = match envelope.error {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Null) | None => DEFAULT_REJECTION.to_string(),
            Some(other) => other.to_string(),
        };
        return Err(ApiError::Rejected(message));
    }

    Ok(envelope.data.filter(|data| !data.is_null()))
}

/// Decode `data` as a list. A single object becomes a one-element list.
pub fn data_list<T: DeserializeOwned>(data: Option<Value>) -> ApiResult<Vec<T>> {
    let items = match data {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| ApiError::MalformedBody(e.to_string())))
        .collect()
}

/// Decode `data` as one record. A list yields its first element.
pub fn data_one<T: DeserializeOwned>(data: Option<Value>) -> ApiResult<Option<T>> {
    let item = match data {
        None => return Ok(None),
        Some(Value::Array(items)) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        Some(single) => single,
    };

    serde_json::from_value(item)
        .map(Some)
        .map_err(|e| ApiError::MalformedBody(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error() {
        let err = parse_envelope(500, "boom").unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                body: "boom".into()
            }
        );
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(parse_envelope(200, ""), Err(ApiError::MalformedBody(_))));
        assert!(matches!(
            parse_envelope(200, "<html>"),
            Err(ApiError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_rejected_surfaces_server_message() {
        let err = parse_envelope(200, r#"{"ok": false, "error": "name required"}"#).unwrap_err();
        assert_eq!(err, ApiError::Rejected("name required".into()));

        let err = parse_envelope(200, r#"{"data": []}"#).unwrap_err();
        assert_eq!(err, ApiError::Rejected(DEFAULT_REJECTION.into()));
    }

    #[test]
    fn test_data_shapes() {
        let data = parse_envelope(200, r#"{"ok": true, "data": {"a": 1}}"#).unwrap();
        let list: Vec<Value> = data_list(data.clone()).unwrap();
        assert_eq!(list, vec![json!({"a": 1})]);

        let one: Option<Value> = data_one(Some(json!([{"a": 2}, {"a": 3}]))).unwrap();
        assert_eq!(one, Some(json!({"a": 2})));

        assert_eq!(parse_envelope(200, r#"{"ok": true, "data": null}"#).unwrap(), None);
        assert!(data_list::<Value>(None).unwrap().is_empty());
        assert!(data_one::<Value>(Some(json!([]))).unwrap().is_none());
    }
}
