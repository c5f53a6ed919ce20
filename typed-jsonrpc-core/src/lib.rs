// Typed JSON-RPC 2.0 core: binds native Rust functions to named procedures
// and drives JSON-RPC requests through them.

pub mod error;
pub mod handle;
pub mod marshal;
pub mod protocol;
pub mod registry;
pub mod wire;

pub use error::{
    CallError, ErrorCode, ParamError, RegistrationError, RpcError, RpcResult, INTERNAL_ERROR_MESSAGE,
};
pub use handle::{ProcedureHandle, ProcedureKind};
pub use marshal::Procedure;
pub use registry::{ParamInfo, ProcedureEntry, ProcedureInfo, Registry};
pub use wire::{Mismatch, WireParam, WireType};

pub use protocol::{
    engine::{render, EngineOptions, ProtocolEngine, Reply},
    request::{Request, RequestError, RequestId, JSONRPC_VERSION},
    response::{Outcome, Response, Version},
};
