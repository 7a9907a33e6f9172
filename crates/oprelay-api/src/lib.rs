//! oprelay-api: Shared wire contract
//!
//! Contains the request/response types exchanged between plugin-side bindings
//! and the execution engine. The schema is versioned: any change to the
//! request envelope requires a bump of [`PROTOCOL_VERSION`].

pub mod connection;
pub mod request;
pub mod response;

/// Version of the request/response envelope.
pub const PROTOCOL_VERSION: u32 = 1;

pub use connection::{KeyMaterial, Platform, RemoteConnection};
pub use request::{
    EnvVars, ExecutionRequest, LogLevel, LogRequest, RunBashRequest, RunExpectRequest,
    RunPowerShellRequest, RunSyncRequest,
};
pub use response::{ExecutionResponse, RunCommandResponse};
