// Procedure registry: name -> handle directory plus the parameter tables used
// for named-parameter normalization and introspection.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, trace};

use crate::error::{CallError, RegistrationError, RpcError};
use crate::handle::{ProcedureHandle, ProcedureKind};
use crate::wire::WireType;

/// One declared parameter of a registered procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    /// `None` for unchecked handles.
    pub wire_type: Option<WireType>,
    pub docstring: Option<String>,
}

/// Registration-time description of a procedure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureInfo {
    pub docstring: Option<String>,
    pub param_names: Option<Vec<String>>,
    pub param_docstrings: Option<Vec<String>>,
    pub metadata: Map<String, Value>,
}

impl ProcedureInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Ordered parameter names. Enables invocation with named parameters.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn param_docs<I, S>(mut self, docstrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_docstrings = Some(docstrings.into_iter().map(Into::into).collect());
        self
    }

    /// Parameter names paired with their docstrings, in declaration order.
    pub fn documented_params<I, N, D>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let (names, docs): (Vec<String>, Vec<String>) = params
            .into_iter()
            .map(|(name, doc)| (name.into(), doc.into()))
            .unzip();
        self.param_names = Some(names);
        self.param_docstrings = Some(docs);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }
}

/// A registered procedure with everything recorded about it.
#[derive(Debug, Clone)]
pub struct ProcedureEntry {
    pub handle: ProcedureHandle,
    pub docstring: Option<String>,
    /// Present when the procedure was registered with parameter names.
    pub params: Option<Vec<ParamInfo>>,
    pub metadata: Map<String, Value>,
}

impl ProcedureEntry {
    fn param_name(&self, position: usize) -> Option<&str> {
        self.params
            .as_ref()
            .and_then(|params| params.get(position))
            .map(|param| param.name.as_str())
    }
}

/// Directory of methods and notifications keyed by procedure name.
///
/// Registration needs `&mut self`; invocation only reads, so a fully built
/// registry can be shared between threads.
#[derive(Debug, Default)]
pub struct Registry {
    methods: HashMap<String, ProcedureEntry>,
    notifications: HashMap<String, ProcedureEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `name`.
    ///
    /// Returns `Ok(false)` without touching the registry if the name is taken.
    /// A parameter list that does not fit the handle is a registration error.
    pub fn add(
        &mut self,
        name: &str,
        handle: ProcedureHandle,
        info: ProcedureInfo,
    ) -> Result<bool, RegistrationError> {
        if self.contains(name) {
            debug!("Procedure already registered: {}", name);
            return Ok(false);
        }

        let params = Self::build_params(name, &handle, info.param_names, info.param_docstrings)?;
        let kind = handle.kind();
        let entry = ProcedureEntry {
            handle,
            docstring: info.docstring,
            params,
            metadata: info.metadata,
        };

        match kind {
            ProcedureKind::Method => self.methods.insert(name.to_string(), entry),
            ProcedureKind::Notification => self.notifications.insert(name.to_string(), entry),
        };

        info!("Registered {:?} procedure: {}", kind, name);
        Ok(true)
    }

    fn build_params(
        name: &str,
        handle: &ProcedureHandle,
        names: Option<Vec<String>>,
        docstrings: Option<Vec<String>>,
    ) -> Result<Option<Vec<ParamInfo>>, RegistrationError> {
        let Some(names) = names else {
            return Ok(None);
        };

        if let Some(arity) = handle.arity() {
            if names.len() != arity {
                return Err(RegistrationError::ParamCountMismatch {
                    name: name.to_string(),
                    listed: names.len(),
                    arity,
                });
            }
        }

        let docstrings = match docstrings {
            Some(docs) if docs.len() != names.len() => {
                return Err(RegistrationError::DocstringCountMismatch {
                    name: name.to_string(),
                    listed: names.len(),
                    docstrings: docs.len(),
                });
            }
            Some(docs) => docs.into_iter().map(Some).collect(),
            None => vec![None; names.len()],
        };

        let types = handle.param_types();
        let params = names
            .into_iter()
            .zip(docstrings)
            .enumerate()
            .map(|(position, (name, docstring))| ParamInfo {
                name,
                wire_type: types.and_then(|types| types.get(position).copied()),
                docstring,
            })
            .collect();
        Ok(Some(params))
    }

    /// Replaces whatever is registered under `name`.
    pub fn force_add(
        &mut self,
        name: &str,
        handle: ProcedureHandle,
        info: ProcedureInfo,
    ) -> Result<(), RegistrationError> {
        self.remove(name);
        let added = self.add(name, handle, info)?;
        debug_assert!(added, "registration after removal must succeed");
        Ok(())
    }

    /// Removes the procedure and everything recorded about it.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.methods.remove(name).is_some() | self.notifications.remove(name).is_some();
        if removed {
            info!("Removed procedure: {}", name);
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contains_method(name) || self.contains_notification(name)
    }

    pub fn contains_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn contains_notification(&self, name: &str) -> bool {
        self.notifications.contains_key(name)
    }

    pub fn method_names(&self) -> BTreeSet<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn notification_names(&self) -> BTreeSet<String> {
        self.notifications.keys().cloned().collect()
    }

    pub fn entry(&self, name: &str) -> Option<&ProcedureEntry> {
        self.methods.get(name).or_else(|| self.notifications.get(name))
    }

    pub fn docstring(&self, name: &str) -> Option<&str> {
        self.entry(name).and_then(|entry| entry.docstring.as_deref())
    }

    /// Declared parameter names; empty when the procedure has none.
    pub fn param_names(&self, name: &str) -> Vec<String> {
        self.entry(name)
            .and_then(|entry| entry.params.as_ref())
            .map(|params| params.iter().map(|param| param.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Parameter types as derived from the native signature.
    pub fn param_types(&self, name: &str) -> Vec<WireType> {
        self.entry(name)
            .and_then(|entry| entry.handle.param_types())
            .map(<[WireType]>::to_vec)
            .unwrap_or_default()
    }

    pub fn param_docstrings(&self, name: &str) -> Vec<String> {
        self.entry(name)
            .and_then(|entry| entry.params.as_ref())
            .map(|params| {
                params
                    .iter()
                    .filter_map(|param| param.docstring.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Merges `metadata` into the entry's metadata bag.
    pub fn add_metadata(&mut self, name: &str, metadata: Map<String, Value>) -> bool {
        let entry = match self.methods.get_mut(name) {
            Some(entry) => entry,
            None => match self.notifications.get_mut(name) {
                Some(entry) => entry,
                None => return false,
            },
        };
        entry.metadata.extend(metadata);
        true
    }

    pub fn method_metadata(&self, name: &str) -> Map<String, Value> {
        self.entry(name)
            .map(|entry| entry.metadata.clone())
            .unwrap_or_default()
    }

    /// Names of all methods whose metadata contains every key of `criteria`
    /// with an equal value, sorted.
    pub fn filter_methods_by_metadata(&self, criteria: &Map<String, Value>) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .iter()
            .filter(|(_, entry)| {
                criteria
                    .iter()
                    .all(|(key, value)| entry.metadata.get(key) == Some(value))
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn invoke_method(&self, name: &str, params: &Value) -> Result<Value, RpcError> {
        let entry = self
            .methods
            .get(name)
            .ok_or_else(|| RpcError::method_not_found(format!("method not found: {}", name)))?;
        trace!("Invoking method {} with {}", name, params);
        Self::dispatch(name, entry, params)
    }

    pub fn invoke_notification(&self, name: &str, params: &Value) -> Result<(), RpcError> {
        let entry = self.notifications.get(name).ok_or_else(|| {
            RpcError::method_not_found(format!("notification not found: {}", name))
        })?;
        trace!("Invoking notification {} with {}", name, params);
        Self::dispatch(name, entry, params).map(|_| ())
    }

    fn dispatch(name: &str, entry: &ProcedureEntry, params: &Value) -> Result<Value, RpcError> {
        let args = Self::normalize(entry, params)?;
        entry.handle.call(&args).map_err(|err| match err {
            CallError::Failed(err) => err,
            CallError::Params(err) => {
                debug!("Parameter error in {}: {}", name, err);
                let param_name = err.position().and_then(|position| entry.param_name(position));
                err.into_rpc_error(param_name)
            }
        })
    }

    /// Turns `params` into positional arguments.
    fn normalize<'a>(entry: &ProcedureEntry, params: &'a Value) -> Result<Cow<'a, [Value]>, RpcError> {
        match params {
            Value::Array(args) => Ok(Cow::Borrowed(args.as_slice())),
            Value::Object(named) => {
                let Some(declared) = entry.params.as_ref() else {
                    return Err(RpcError::invalid_params(
                        "invalid parameter: procedure doesn't support named parameter",
                    ));
                };
                let args = declared
                    .iter()
                    .map(|param| {
                        named.get(&param.name).cloned().ok_or_else(|| {
                            RpcError::invalid_params(format!(
                                "invalid parameter: missing named parameter \"{}\"",
                                param.name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Cow::Owned(args))
            }
            _ => Err(RpcError::invalid_request(
                "invalid request: params field must be an array, object",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, RpcResult};
    use serde_json::json;

    fn add(a: u32, b: u32) -> RpcResult<u32> {
        Ok(a + b)
    }

    fn add3(a: u32, b: u32, c: u32) -> RpcResult<u32> {
        Ok(a + b + c)
    }

    #[test]
    fn test_add_rejects_duplicates_across_kinds() {
        let mut registry = Registry::new();
        assert_eq!(registry.add("x", ProcedureHandle::method(add), ProcedureInfo::new()), Ok(true));
        assert_eq!(registry.add("x", ProcedureHandle::method(add), ProcedureInfo::new()), Ok(false));
        let notify = ProcedureHandle::notification(|_s: String| -> RpcResult<()> { Ok(()) });
        assert_eq!(registry.add("x", notify, ProcedureInfo::new()), Ok(false));
        assert!(registry.contains_method("x"));
        assert!(!registry.contains_notification("x"));
    }

    #[test]
    fn test_param_count_mismatch_leaves_name_unregistered() {
        let mut registry = Registry::new();
        let err = registry
            .add("add_function", ProcedureHandle::method(add), ProcedureInfo::new().params(["a"]))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ParamCountMismatch {
                name: "add_function".to_string(),
                listed: 1,
                arity: 2,
            }
        );
        assert!(!registry.contains("add_function"));
    }

    #[test]
    fn test_docstring_count_mismatch_is_an_error() {
        let mut registry = Registry::new();
        let info = ProcedureInfo::new().params(["a", "b"]).param_docs(["A"]);
        let err = registry.add("add", ProcedureHandle::method(add), info).unwrap_err();
        assert!(matches!(err, RegistrationError::DocstringCountMismatch { docstrings: 1, .. }));
        assert!(!registry.contains("add"));
    }

    #[test]
    fn test_unsupported_named_params() {
        let mut registry = Registry::new();
        registry.add("add", ProcedureHandle::method(add), ProcedureInfo::new()).unwrap();
        let err = registry.invoke_method("add", &json!({"a": 1, "b": 2})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(err.message, "invalid parameter: procedure doesn't support named parameter");
    }

    #[test]
    fn test_malformed_params_shape() {
        let mut registry = Registry::new();
        registry.add("add", ProcedureHandle::method(add), ProcedureInfo::new()).unwrap();
        let err = registry.invoke_method("add", &json!(true)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "-32600: invalid request: params field must be an array, object"
        );
    }

    #[test]
    fn test_force_add_replaces_signature_and_tables() {
        let mut registry = Registry::new();
        let info = ProcedureInfo::new()
            .doc("Add function")
            .documented_params([("a", "A"), ("b", "B")])
            .meta("tag", "old");
        registry.add("add", ProcedureHandle::method(add), info).unwrap();

        registry
            .force_add("add", ProcedureHandle::method(add3), ProcedureInfo::new().params(["x", "y", "z"]))
            .unwrap();
        assert_eq!(registry.invoke_method("add", &json!([5, 10, 15])), Ok(json!(30)));
        assert_eq!(registry.param_names("add"), vec!["x", "y", "z"]);
        assert!(registry.param_docstrings("add").is_empty());
        assert_eq!(registry.docstring("add"), None);
        assert!(registry.method_metadata("add").is_empty());
    }

    #[test]
    fn test_unchecked_handle_accepts_any_name_list() {
        let mut registry = Registry::new();
        let handle = ProcedureHandle::unchecked_method(|args| -> RpcResult<Value> {
            Ok(Value::Array(args))
        });
        registry
            .add("echo", handle, ProcedureInfo::new().params(["first", "second"]))
            .unwrap();
        assert_eq!(
            registry.invoke_method("echo", &json!({"second": 2, "first": 1})),
            Ok(json!([1, 2]))
        );
        assert!(registry.param_types("echo").is_empty());
    }

    #[test]
    fn test_add_metadata_merges() {
        let mut registry = Registry::new();
        registry
            .add("add", ProcedureHandle::method(add), ProcedureInfo::new().meta("a", 1))
            .unwrap();
        let mut extra = Map::new();
        extra.insert("b".to_string(), json!(2));
        assert!(registry.add_metadata("add", extra.clone()));
        assert!(!registry.add_metadata("missing", extra));
        assert_eq!(Value::Object(registry.method_metadata("add")), json!({"a": 1, "b": 2}));
    }
}
