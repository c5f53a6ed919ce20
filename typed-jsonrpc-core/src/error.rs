use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::wire::WireType;

/// JSON-RPC 2.0 error codes. Anything outside the reserved set is carried
/// through as an application-defined code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Application(i32),
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::Application(code) => code,
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            other => ErrorCode::Application(other),
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The error object carried by a JSON-RPC error response.
///
/// Procedures return this type to raise an application error; its code,
/// message and data reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        RpcError {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: impl Into<ErrorCode>, message: impl Into<String>, data: Value) -> Self {
        RpcError {
            code: code.into(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotFound, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Maps a failure raised by a procedure onto an error object.
    ///
    /// An `RpcError` travelling inside the failure is an application error and
    /// is returned as-is. Anything else becomes an internal error described by
    /// its `Display` output.
    pub fn from_failure(failure: anyhow::Error) -> Self {
        match failure.downcast::<RpcError>() {
            Ok(err) => err,
            Err(other) => {
                let description = other.to_string();
                if description.is_empty() {
                    RpcError::internal(INTERNAL_ERROR_MESSAGE)
                } else {
                    RpcError::internal(format!("{}: {}", INTERNAL_ERROR_MESSAGE, description))
                }
            }
        }
    }
}

/// Message used for internal errors that carry no description of their own.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{}: {}, data: {}", self.code, self.message, data),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::internal(format!("{}: {}", INTERNAL_ERROR_MESSAGE, err))
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// A marshaling failure raised while bridging wire arguments to a native call.
///
/// Every variant except `Arity` records the 0-based position of the offending
/// argument so the registry can name it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("invalid parameters: expected {expected} argument(s), but found {found}")]
    Arity { expected: usize, found: usize },

    #[error("invalid parameter: must be {expected}, but is {actual}")]
    Type {
        position: usize,
        expected: WireType,
        actual: WireType,
    },

    #[error("invalid parameter: exceeds value range of {expected}")]
    Range { position: usize, expected: WireType },

    #[error("invalid parameter: {reason}")]
    Conversion { position: usize, reason: String },
}

impl ParamError {
    pub fn position(&self) -> Option<usize> {
        match self {
            ParamError::Arity { .. } => None,
            ParamError::Type { position, .. }
            | ParamError::Range { position, .. }
            | ParamError::Conversion { position, .. } => Some(*position),
        }
    }

    /// Builds the invalid-params error object, citing the parameter by name
    /// when one is known and by position otherwise.
    pub fn into_rpc_error(self, param_name: Option<&str>) -> RpcError {
        let mut message = self.to_string();
        if let Some(position) = self.position() {
            match param_name {
                Some(name) => message.push_str(&format!(" for parameter \"{}\"", name)),
                None => message.push_str(&format!(" for parameter {}", position)),
            }
        }
        RpcError::invalid_params(message)
    }
}

/// Outcome of calling a procedure handle: either the arguments did not fit
/// the signature, or the procedure itself failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Params(#[from] ParamError),

    #[error(transparent)]
    Failed(#[from] RpcError),
}

/// Programmer mistakes detected while registering a procedure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Error registering RPC method \"{name}\": number of listed parameters ({listed}) does not match registered method's parameter list ({arity}).")]
    ParamCountMismatch {
        name: String,
        listed: usize,
        arity: usize,
    },

    #[error("Error registering RPC method \"{name}\": number of listed parameters ({listed}) must match number of parameter docstrings ({docstrings}), or no docstrings must be provided.")]
    DocstringCountMismatch {
        name: String,
        listed: usize,
        docstrings: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_round_trips_reserved_values() {
        for code in [-32700, -32600, -32601, -32602, -32603] {
            assert_eq!(ErrorCode::from(code).code(), code);
        }
        assert_eq!(ErrorCode::from(-32602), ErrorCode::InvalidParams);
        assert_eq!(ErrorCode::from(-50000), ErrorCode::Application(-50000));
    }

    #[test]
    fn test_error_serializes_code_as_integer() {
        let err = RpcError::with_data(-50000, "product not found", json!({"id": 444}));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({"code": -50000, "message": "product not found", "data": {"id": 444}})
        );

        let value = serde_json::to_value(RpcError::invalid_request("bad")).unwrap();
        assert_eq!(value, json!({"code": -32600, "message": "bad"}));
    }

    #[test]
    fn test_error_display() {
        let err = RpcError::invalid_params("invalid parameter: missing named parameter \"b\"");
        assert_eq!(
            err.to_string(),
            "-32602: invalid parameter: missing named parameter \"b\""
        );

        let err = RpcError::with_data(-1, "oops", json!([1]));
        assert_eq!(err.to_string(), "-1: oops, data: [1]");
    }

    #[test]
    fn test_failure_passes_application_errors_through() {
        let app = RpcError::with_data(-32602, "b must not be 0", json!("b"));
        let err = RpcError::from_failure(anyhow::Error::new(app.clone()));
        assert_eq!(err, app);
    }

    #[test]
    fn test_failure_maps_foreign_errors_to_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = RpcError::from_failure(io.into());
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "internal server error: disk on fire");

        let err = RpcError::from_failure(anyhow::anyhow!(""));
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn test_param_error_names_position() {
        let err = ParamError::Type {
            position: 0,
            expected: WireType::Unsigned,
            actual: WireType::String,
        };
        assert_eq!(
            err.clone().into_rpc_error(Some("a")).message,
            "invalid parameter: must be unsigned integer, but is string for parameter \"a\""
        );
        assert_eq!(
            err.into_rpc_error(None).message,
            "invalid parameter: must be unsigned integer, but is string for parameter 0"
        );

        let arity = ParamError::Arity { expected: 2, found: 1 };
        assert_eq!(arity.position(), None);
        assert_eq!(
            arity.into_rpc_error(Some("a")).message,
            "invalid parameters: expected 2 argument(s), but found 1"
        );
    }

    #[test]
    fn test_registration_error_cites_both_counts() {
        let err = RegistrationError::ParamCountMismatch {
            name: "add_function".to_string(),
            listed: 1,
            arity: 2,
        };
        assert_eq!(
            err.to_string(),
            "Error registering RPC method \"add_function\": number of listed parameters (1) does not match registered method's parameter list (2)."
        );
    }
}
