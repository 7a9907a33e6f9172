//! oprelay-engine: Execution engine for the remote operation protocol
//!
//! Receives typed execution requests, resolves the target environment into a
//! channel, dispatches to the matching verb executor, and returns a typed
//! response or failure. Hosts inject the engine behind the
//! [`RemoteExecutionBackend`] interface.

pub mod backend;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logsink;

pub use backend::RemoteExecutionBackend;
pub use engine::{EngineOptions, ExecutionEngine};
pub use error::EngineError;
pub use logsink::{LogRecord, LogSink, MemoryLogSink, TracingLogSink};
