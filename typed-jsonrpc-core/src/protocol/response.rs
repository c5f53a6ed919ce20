use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::request::{RequestId, JSONRPC_VERSION};
use crate::error::RpcError;

/// Version marker that serializes as `"2.0"` and refuses anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(Version)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version: {}",
                version
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "result")]
    Success(JsonValue),
    #[serde(rename = "error")]
    Failure(RpcError),
}

/// A JSON-RPC 2.0 response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: RequestId, result: JsonValue) -> Self {
        Response {
            jsonrpc: Version,
            id,
            outcome: Outcome::Success(result),
        }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Response {
            jsonrpc: Version,
            id,
            outcome: Outcome::Failure(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
