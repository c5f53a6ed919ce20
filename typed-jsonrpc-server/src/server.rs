use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use typed_jsonrpc_core::{
    render, EngineOptions, Procedure, ProcedureHandle, ProcedureInfo, ProtocolEngine, RegistrationError,
    Registry, WireType,
};

/// Method names starting with this prefix belong to the protocol and cannot
/// be registered.
pub const RESERVED_PREFIX: &str = "rpc.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Batches longer than this are refused as a whole. Unlimited when unset.
    pub max_batch_size: Option<usize>,
}

impl From<ServerConfig> for EngineOptions {
    fn from(config: ServerConfig) -> Self {
        EngineOptions {
            max_batch_size: config.max_batch_size,
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// JSON-RPC 2.0 server: a procedure registry plus the engine that answers
/// requests against it.
///
/// Register everything first, then share the server (for example behind an
/// `Arc`) and call [`JsonRpcServer::handle_request`] from as many threads as
/// needed.
#[derive(Debug, Default)]
pub struct JsonRpcServer {
    config: ServerConfig,
    registry: Registry,
    engine: ProtocolEngine,
}

impl JsonRpcServer {
    pub fn new(config: ServerConfig) -> Self {
        JsonRpcServer {
            engine: ProtocolEngine::new(config.clone().into()),
            registry: Registry::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a handle. Reserved and already taken names yield `Ok(false)`.
    pub fn add(
        &mut self,
        name: &str,
        handle: ProcedureHandle,
        info: ProcedureInfo,
    ) -> Result<bool, RegistrationError> {
        if is_reserved(name) {
            warn!("Refusing to register reserved name: {}", name);
            return Ok(false);
        }
        self.registry.add(name, handle, info)
    }

    /// Registers a function, closure or bound instance method returning a
    /// result.
    pub fn add_method<Args, F>(
        &mut self,
        name: &str,
        method: F,
        info: ProcedureInfo,
    ) -> Result<bool, RegistrationError>
    where
        F: Procedure<Args>,
        F::Output: Serialize,
    {
        self.add(name, ProcedureHandle::method(method), info)
    }

    pub fn add_notification<Args, F>(
        &mut self,
        name: &str,
        notification: F,
        info: ProcedureInfo,
    ) -> Result<bool, RegistrationError>
    where
        F: Procedure<Args, Output = ()>,
    {
        self.add(name, ProcedureHandle::notification(notification), info)
    }

    /// Registers `handle`, replacing any procedure of the same name.
    /// Reserved names yield `Ok(false)`.
    pub fn force_add(
        &mut self,
        name: &str,
        handle: ProcedureHandle,
        info: ProcedureInfo,
    ) -> Result<bool, RegistrationError> {
        if is_reserved(name) {
            warn!("Refusing to register reserved name: {}", name);
            return Ok(false);
        }
        self.registry.force_add(name, handle, info)?;
        Ok(true)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        !is_reserved(name) && self.registry.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        !is_reserved(name) && self.registry.contains(name)
    }

    pub fn contains_method(&self, name: &str) -> bool {
        !is_reserved(name) && self.registry.contains_method(name)
    }

    pub fn contains_notification(&self, name: &str) -> bool {
        !is_reserved(name) && self.registry.contains_notification(name)
    }

    pub fn method_names(&self) -> BTreeSet<String> {
        self.registry.method_names()
    }

    pub fn notification_names(&self) -> BTreeSet<String> {
        self.registry.notification_names()
    }

    pub fn docstring(&self, name: &str) -> Option<&str> {
        self.registry.docstring(name)
    }

    pub fn param_names(&self, name: &str) -> Vec<String> {
        self.registry.param_names(name)
    }

    pub fn param_types(&self, name: &str) -> Vec<WireType> {
        self.registry.param_types(name)
    }

    pub fn param_docstrings(&self, name: &str) -> Vec<String> {
        self.registry.param_docstrings(name)
    }

    pub fn add_metadata(&mut self, name: &str, metadata: Map<String, Value>) -> bool {
        self.registry.add_metadata(name, metadata)
    }

    pub fn method_metadata(&self, name: &str) -> Map<String, Value> {
        self.registry.method_metadata(name)
    }

    pub fn filter_methods_by_metadata(&self, criteria: &Map<String, Value>) -> Vec<String> {
        self.registry.filter_methods_by_metadata(criteria)
    }

    /// Answers a raw request. The empty string means no response is due.
    pub fn handle_request(&self, request: &str) -> String {
        self.engine.handle_request(&self.registry, request)
    }

    /// Answers an already parsed request. The empty string means no response
    /// is due.
    pub fn handle_value(&self, request: &Value) -> String {
        match self.engine.handle_value(&self.registry, request) {
            Some(reply) => render(&reply),
            None => {
                debug!("No response due");
                String::new()
            }
        }
    }
}
