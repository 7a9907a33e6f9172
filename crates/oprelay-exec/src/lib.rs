//! oprelay-exec: Channel transports and connection resolution
//!
//! Resolves connection descriptors into live, authenticated channels and
//! provides the SSH and local transports the verb executors run against.

pub mod error;
pub mod keys;
pub mod local;
pub mod output;
pub mod quote;
pub mod resolver;
pub mod ssh;
pub mod traits;

pub use error::ChannelError;
pub use local::LocalChannel;
pub use output::ExecOutput;
pub use quote::sh_quote;
pub use resolver::ConnectionResolver;
pub use ssh::SshChannel;
pub use traits::{Channel, EntryKind, RemoteEntry};
