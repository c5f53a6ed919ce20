use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::error::RpcError;

/// The only protocol version this engine speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
    Null,
}

impl RequestId {
    /// Reads a valid id value. Anything other than a number, string or null
    /// is not an id.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => Some(RequestId::Number(n.clone())),
            JsonValue::String(s) => Some(RequestId::String(s.clone())),
            JsonValue::Null => Some(RequestId::Null),
            _ => None,
        }
    }

    /// Id to use when answering `value`: its `id` member if that is a valid
    /// id, `null` otherwise.
    pub fn recover(value: &JsonValue) -> Self {
        value
            .get("id")
            .and_then(RequestId::from_json)
            .unwrap_or(RequestId::Null)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// A validated request. `id == None` marks a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<RequestId>,
    pub method: String,
    /// Always an array or an object; absent or null params become `[]`.
    pub params: JsonValue,
}

impl Request {
    /// Validates the shape of one request object.
    pub fn from_json(value: &JsonValue) -> Result<Self, RequestError> {
        let object = value.as_object().ok_or(RequestError::MissingVersion)?;

        if object.get("jsonrpc").and_then(JsonValue::as_str) != Some(JSONRPC_VERSION) {
            return Err(RequestError::MissingVersion);
        }

        let method = object
            .get("method")
            .and_then(JsonValue::as_str)
            .ok_or(RequestError::InvalidMethod)?;

        let id = match object.get("id") {
            None => None,
            Some(id) => Some(RequestId::from_json(id).ok_or(RequestError::InvalidId)?),
        };

        let params = match object.get("params") {
            None | Some(JsonValue::Null) => JsonValue::Array(Vec::new()),
            Some(params @ (JsonValue::Array(_) | JsonValue::Object(_))) => params.clone(),
            Some(_) => return Err(RequestError::InvalidParams),
        };

        Ok(Request {
            id,
            method: method.to_string(),
            params,
        })
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Reasons a request object is rejected before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid request: expected array or object")]
    NotArrayOrObject,

    #[error("invalid request: missing jsonrpc field set to \"2.0\"")]
    MissingVersion,

    #[error("invalid request: method field must be a string")]
    InvalidMethod,

    #[error("invalid request: id field must be a number, string or null")]
    InvalidId,

    #[error("invalid request: params field must be an array, object or null")]
    InvalidParams,

    #[error("invalid request: batch of {size} requests exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

impl From<RequestError> for RpcError {
    fn from(err: RequestError) -> Self {
        RpcError::invalid_request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_call() {
        let request = Request::from_json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "add", "params": [3, 4]
        }))
        .unwrap();
        assert_eq!(request.id, Some(RequestId::from(1)));
        assert_eq!(request.method, "add");
        assert_eq!(request.params, json!([3, 4]));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_notification_with_null_params() {
        let request = Request::from_json(&json!({
            "jsonrpc": "2.0", "method": "ping", "params": null
        }))
        .unwrap();
        assert!(request.is_notification());
        assert_eq!(request.params, json!([]));
    }

    #[test]
    fn test_null_id_is_not_a_notification() {
        let request = Request::from_json(&json!({"jsonrpc": "2.0", "id": null, "method": "m"})).unwrap();
        assert_eq!(request.id, Some(RequestId::Null));
    }

    #[test]
    fn test_rejections() {
        let cases = [
            (json!(""), RequestError::MissingVersion),
            (json!({"id": 1, "method": "m"}), RequestError::MissingVersion),
            (json!({"jsonrpc": "3.0", "id": 1, "method": "m"}), RequestError::MissingVersion),
            (json!({"jsonrpc": null, "id": 1, "method": "m"}), RequestError::MissingVersion),
            (json!({"jsonrpc": "2.0", "id": 1}), RequestError::InvalidMethod),
            (json!({"jsonrpc": "2.0", "id": 1, "method": 33}), RequestError::InvalidMethod),
            (json!({"jsonrpc": "2.0", "id": true, "method": "m"}), RequestError::InvalidId),
            (json!({"jsonrpc": "2.0", "id": [3], "method": "m"}), RequestError::InvalidId),
            (json!({"jsonrpc": "2.0", "id": 1, "method": "m", "params": true}), RequestError::InvalidParams),
        ];
        for (value, expected) in cases {
            assert_eq!(Request::from_json(&value), Err(expected), "request: {}", value);
        }
    }

    #[test]
    fn test_id_recovery() {
        assert_eq!(RequestId::recover(&json!({"id": "abc"})), RequestId::from("abc"));
        assert_eq!(RequestId::recover(&json!({"id": {"a": "b"}})), RequestId::Null);
        assert_eq!(RequestId::recover(&json!({})), RequestId::Null);
        assert_eq!(RequestId::recover(&json!([1])), RequestId::Null);
    }

    #[test]
    fn test_id_serializes_verbatim() {
        assert_eq!(serde_json::to_value(RequestId::from(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(RequestId::from("x")).unwrap(), json!("x"));
        assert_eq!(serde_json::to_value(RequestId::Null).unwrap(), json!(null));
        let float: RequestId = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(serde_json::to_value(float).unwrap(), json!(1.5));
    }
}
