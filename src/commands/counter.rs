//! Counter commands (INCR, INCRBY, DECR, DECRBY)

use super::{signature::parse_int, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::ValueKind;
use bytes::Bytes;

/// Add `delta` to the integer stored at the item, creating it at 0
///
/// The key keeps its TTL.
fn increment(args: &mut Args, delta: i64) -> CommandResult {
    let item = args.item(0)?;
    let existed = item.exists();
    let current = item.string_mut()?;
    let value = if existed { parse_int(current)? } else { 0 };
    let updated = value.checked_add(delta).ok_or(CommandError::Overflow)?;
    *current = Bytes::from(updated.to_string());
    Ok(RespValue::integer(updated))
}

fn counter_signature(name: &'static str, with_amount: bool) -> Signature {
    let mut params = vec![Param::typed(ValueKind::String)];
    if with_amount {
        params.push(Param::Int);
    }
    Signature::new(name, params)
}

/// INCR command - Increment the integer value of a key by 1
///
/// Syntax: INCR key
pub struct IncrCommand;

impl Command for IncrCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        increment(args, 1)
    }

    fn signature(&self) -> Signature {
        counter_signature("incr", false)
    }
}

/// INCRBY command - Increment the integer value of a key by the given amount
///
/// Syntax: INCRBY key increment
pub struct IncrByCommand;

impl Command for IncrByCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let delta = args.int(1)?;
        increment(args, delta)
    }

    fn signature(&self) -> Signature {
        counter_signature("incrby", true)
    }
}

/// DECR command - Decrement the integer value of a key by 1
///
/// Syntax: DECR key
pub struct DecrCommand;

impl Command for DecrCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        increment(args, -1)
    }

    fn signature(&self) -> Signature {
        counter_signature("decr", false)
    }
}

/// DECRBY command - Decrement the integer value of a key by the given amount
///
/// Syntax: DECRBY key decrement
pub struct DecrByCommand;

impl Command for DecrByCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let delta = args.int(1)?.checked_neg().ok_or(CommandError::Overflow)?;
        increment(args, delta)
    }

    fn signature(&self) -> Signature {
        counter_signature("decrby", true)
    }
}
