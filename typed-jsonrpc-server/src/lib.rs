pub mod logging;
pub mod server;

pub use logging::{init_logging, init_test_logging};
pub use server::{JsonRpcServer, ServerConfig, RESERVED_PREFIX};

// Everything needed to register procedures comes from the core crate.
pub use typed_jsonrpc_core::{
    wire_enum, wire_object, ErrorCode, ParamInfo, Procedure, ProcedureHandle, ProcedureInfo,
    ProcedureKind, RegistrationError, RpcError, RpcResult, WireParam, WireType,
};
