//! Wire envelope: request parsing, response shapes and transport errors.

pub mod envelope;
pub mod error;

pub use envelope::{Envelope, EnvelopeError, Operation, RpcErrorBody, RpcResponse, JSONRPC_VERSION};
pub use error::DispatchError;
