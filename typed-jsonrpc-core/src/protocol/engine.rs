//! Request/response state machine.
//!
//! The engine validates request objects, routes them to the registry and
//! turns every outcome into a response. Nothing raised while handling a
//! request escapes: protocol rejections, parameter errors, application
//! errors and panics all end up as error objects, and notifications end up
//! as nothing at all.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace, warn};

use super::request::{Request, RequestError, RequestId};
use super::response::Response;
use crate::error::{RpcError, INTERNAL_ERROR_MESSAGE};
use crate::registry::Registry;

/// Emitted if a reply somehow fails to serialize.
const FALLBACK_REPLY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal server error"}}"#;

/// Engine tunables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Largest batch that is processed. `None` means unlimited.
    pub max_batch_size: Option<usize>,
}

/// What the engine answers to one top-level request value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Single(Response),
    Batch(Vec<Response>),
}

impl Reply {
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProtocolEngine {
    options: EngineOptions,
}

impl ProtocolEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Text entry point. Returns the serialized reply, or an empty string
    /// when the request was a single notification.
    #[tracing::instrument(skip_all, fields(len = request.len()))]
    pub fn handle_request(&self, registry: &Registry, request: &str) -> String {
        let value: JsonValue = match serde_json::from_str(request) {
            Ok(value) => value,
            Err(err) => {
                debug!("Rejecting unparsable request: {}", err);
                let reply = Reply::Single(Response::error(
                    RequestId::Null,
                    RpcError::parse_error(format!("parse error: {}", err)),
                ));
                return render(&reply);
            }
        };

        match self.handle_value(registry, &value) {
            Some(reply) => render(&reply),
            None => String::new(),
        }
    }

    /// Handles an already parsed request value. `None` means there is
    /// nothing to send back.
    pub fn handle_value(&self, registry: &Registry, request: &JsonValue) -> Option<Reply> {
        match request {
            JsonValue::Array(batch) => Some(self.handle_batch(registry, batch)),
            JsonValue::Object(_) => self.handle_single(registry, request).map(Reply::Single),
            _ => {
                debug!("Rejecting request that is neither array nor object");
                Some(Reply::Single(Response::error(
                    RequestId::Null,
                    RequestError::NotArrayOrObject.into(),
                )))
            }
        }
    }

    fn handle_batch(&self, registry: &Registry, batch: &[JsonValue]) -> Reply {
        if let Some(limit) = self.options.max_batch_size {
            if batch.len() > limit {
                warn!("Rejecting batch of {} requests (limit {})", batch.len(), limit);
                let err = RequestError::BatchTooLarge {
                    size: batch.len(),
                    limit,
                };
                return Reply::Single(Response::error(RequestId::Null, err.into()));
            }
        }

        debug!("Handling batch of {} requests", batch.len());
        let responses = batch
            .iter()
            .filter_map(|request| self.handle_single(registry, request))
            .collect();
        Reply::Batch(responses)
    }

    /// Handles one request object. Notifications yield `None` whatever
    /// happens to them.
    pub fn handle_single(&self, registry: &Registry, request: &JsonValue) -> Option<Response> {
        let parsed = match Request::from_json(request) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("Invalid request: {}", err);
                return Some(Response::error(RequestId::recover(request), err.into()));
            }
        };

        match parsed.id {
            None => {
                if let Err(err) = guarded(|| registry.invoke_notification(&parsed.method, &parsed.params)) {
                    warn!("Notification {} failed: {}", parsed.method, err);
                }
                None
            }
            Some(id) => {
                let response = match guarded(|| registry.invoke_method(&parsed.method, &parsed.params)) {
                    Ok(result) => Response::success(id, result),
                    Err(err) => {
                        debug!("Method {} failed: {}", parsed.method, err);
                        Response::error(id, err)
                    }
                };
                trace!("Response: {:?}", response);
                Some(response)
            }
        }
    }
}

/// Runs a registry call, turning a panic into an internal error.
fn guarded<T>(call: impl FnOnce() -> Result<T, RpcError>) -> Result<T, RpcError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let err = panic_error(payload.as_ref());
        warn!("Procedure panicked: {}", err.message);
        Err(err)
    })
}

fn panic_error(payload: &(dyn Any + Send)) -> RpcError {
    let description = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .filter(|s| !s.is_empty());
    match description {
        Some(description) => RpcError::internal(format!("{}: {}", INTERNAL_ERROR_MESSAGE, description)),
        None => RpcError::internal(INTERNAL_ERROR_MESSAGE),
    }
}

/// Serializes a reply for the wire. A reply that cannot be serialized is
/// answered with a generic internal error, never with nothing.
pub fn render(reply: &Reply) -> String {
    serde_json::to_string(reply).unwrap_or_else(|err| {
        warn!("Failed to serialize reply: {}", err);
        FALLBACK_REPLY.to_string()
    })
}
