//! redemu - an in-process emulation of a Redis-protocol server
//!
//! Client code talks to a `FakeLink` (or, optionally, a TCP listener) and
//! gets the command semantics, data model and concurrency behaviour of a
//! real server without running one:
//! - `store` holds the keyspaces and their value types
//! - `commands` validates arguments and runs the handlers
//! - `dispatch` owns per-session state, transactions and blocking waits
//! - `server` ties databases, pub/sub and transports together

pub mod clock;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;

/// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{Command, CommandContext, CommandItem};
pub use config::{ServerConfig, ServerType};
pub use dispatch::Session;
pub use error::{CommandError, LinkError, ProtocolError};
pub use protocol::RespValue;
pub use server::{FakeLink, Server, ServerRegistry};
pub use store::{Database, Item, Value};
