// JSON-RPC 2.0 wire protocol: request validation, response objects and the
// engine that drives single and batch requests through a registry.

pub mod engine;
pub mod request;
pub mod response;

pub use engine::*;
pub use request::*;
pub use response::*;
