//! Command execution module
//!
//! Provides a unified interface for all commands through the Command trait.
//! Each command family is implemented in a separate file for high cohesion.

mod context;
mod item;
mod registry;
pub mod signature;

// Command implementations
mod admin;
mod connection;
mod counter;
mod hash;
mod key;
mod list;
mod pubsub;
mod search;
mod set;
mod sorted_set;
mod stream;
mod stream_group;
mod string;
mod transaction;
mod ttl;

pub use context::CommandContext;
pub use item::CommandItem;
pub use registry::{CommandRegistry, CommandSpec};
pub use signature::{Args, Flags, Param, Signature, Validated};

use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

/// Command execution trait
///
/// Handlers receive decoded arguments and already-resolved key items; the
/// dispatcher writes the items back when `execute` returns `Ok`.
pub trait Command: Send + Sync {
    /// Execute the command with the given context and arguments
    ///
    /// Arguments:
    /// - ctx: the command context (server state, session)
    /// - args: decoded arguments (excluding the command name itself)
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult;

    /// Declared argument shape and flags, read once at registration
    fn signature(&self) -> Signature;
}

/// Case-insensitive option keyword check
pub(crate) fn is_keyword(arg: &[u8], keyword: &str) -> bool {
    arg.eq_ignore_ascii_case(keyword.as_bytes())
}

/// Parse a non-negative count argument
pub(crate) fn parse_count(arg: &[u8]) -> Result<usize, CommandError> {
    let n = signature::parse_int(arg)?;
    usize::try_from(n).map_err(|_| CommandError::custom("ERR", "value is out of range, must be positive"))
}

/// Resolve a possibly negative index against a length, clamping to bounds
///
/// Returns `None` when the range is empty.
pub(crate) fn clamp_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// `[a, b, c]` as bulk strings
pub(crate) fn bulk_list<'a>(items: impl IntoIterator<Item = &'a Bytes>) -> RespValue {
    RespValue::bulk_array(items.into_iter().cloned())
}

/// Human readable form of the arguments for error messages
pub(crate) fn quote_args(args: &[Bytes]) -> String {
    args.iter()
        .map(|a| format!("'{}' ", String::from_utf8_lossy(a)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(0, -1, 3), Some((0, 2)));
        assert_eq!(clamp_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(clamp_range(-10, 1, 3), Some((0, 1)));
        assert_eq!(clamp_range(1, 100, 3), Some((1, 2)));
        assert_eq!(clamp_range(2, 1, 3), None);
        assert_eq!(clamp_range(5, 10, 3), None);
        assert_eq!(clamp_range(0, -1, 0), None);
    }

    #[test]
    fn test_keyword_and_count() {
        assert!(is_keyword(b"withscores", "WITHSCORES"));
        assert!(!is_keyword(b"withscore", "WITHSCORES"));
        assert_eq!(parse_count(b"3"), Ok(3));
        assert!(parse_count(b"-1").is_err());
    }
}
