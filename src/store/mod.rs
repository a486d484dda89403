//! Keyspace storage module
//!
//! Provides the per-database keyspace and the value types it holds.
//! This module is independent of protocol and command handling (loose coupling).

mod database;
mod entry;
mod value;
pub mod pattern;
pub mod scan;
pub mod stream;
pub mod zset;

pub use database::{ChangeListener, Database, ListenerId, SessionId};
pub use entry::Item;
pub use pattern::Pattern;
pub use stream::{Stream, StreamId};
pub use value::{Value, ValueKind};
pub use zset::SortedSet;
