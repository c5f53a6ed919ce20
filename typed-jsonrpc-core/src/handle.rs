use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, RpcError};
use crate::marshal::Procedure;
use crate::wire::WireType;

type Bridge = Arc<dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync>;

/// Whether a procedure produces a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Method,
    Notification,
}

/// Type-erased procedure produced by the marshaler.
///
/// Cloning is cheap: clones share the same bridge closure.
#[derive(Clone)]
pub struct ProcedureHandle {
    kind: ProcedureKind,
    param_types: Option<Vec<WireType>>,
    bridge: Bridge,
}

impl ProcedureHandle {
    /// Wraps a value-returning procedure. The result is converted back to a
    /// wire value with serde.
    pub fn method<Args, F>(procedure: F) -> Self
    where
        F: Procedure<Args>,
        F::Output: Serialize,
    {
        Self {
            kind: ProcedureKind::Method,
            param_types: Some(F::param_types()),
            bridge: Arc::new(move |args| {
                let result = procedure.invoke(args)?;
                serde_json::to_value(result).map_err(|err| CallError::Failed(RpcError::from(err)))
            }),
        }
    }

    /// Wraps a procedure that produces no result.
    pub fn notification<Args, F>(procedure: F) -> Self
    where
        F: Procedure<Args, Output = ()>,
    {
        Self {
            kind: ProcedureKind::Notification,
            param_types: Some(F::param_types()),
            bridge: Arc::new(move |args| {
                procedure.invoke(args)?;
                Ok(Value::Null)
            }),
        }
    }

    /// Wraps a method that receives the positional arguments as they are,
    /// without arity or type checking.
    pub fn unchecked_method<F, E>(procedure: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        Self {
            kind: ProcedureKind::Method,
            param_types: None,
            bridge: Arc::new(move |args| {
                procedure(args.to_vec())
                    .map_err(|failure| CallError::Failed(RpcError::from_failure(failure.into())))
            }),
        }
    }

    /// Notification counterpart of [`ProcedureHandle::unchecked_method`].
    pub fn unchecked_notification<F, E>(procedure: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        Self {
            kind: ProcedureKind::Notification,
            param_types: None,
            bridge: Arc::new(move |args| {
                procedure(args.to_vec())
                    .map(|()| Value::Null)
                    .map_err(|failure| CallError::Failed(RpcError::from_failure(failure.into())))
            }),
        }
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn is_method(&self) -> bool {
        self.kind == ProcedureKind::Method
    }

    pub fn is_notification(&self) -> bool {
        self.kind == ProcedureKind::Notification
    }

    /// Declared parameter count; `None` for unchecked handles.
    pub fn arity(&self) -> Option<usize> {
        self.param_types.as_ref().map(Vec::len)
    }

    pub fn param_types(&self) -> Option<&[WireType]> {
        self.param_types.as_deref()
    }

    /// Runs the bridge. Notifications yield `null`.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.bridge)(args)
    }
}

impl fmt::Debug for ProcedureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureHandle")
            .field("kind", &self.kind)
            .field("param_types", &self.param_types)
            .finish_non_exhaustive()
    }
}
