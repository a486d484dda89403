//! List commands (LPUSH, RPUSH, LPOP, RPOP, LLEN, LRANGE, BLPOP, BRPOP)

use super::{bulk_list, clamp_range, parse_count, signature::parse_timeout, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::ValueKind;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq)]
enum End {
    Left,
    Right,
}

fn push(args: &mut Args, end: End) -> CommandResult {
    let values: Vec<Bytes> = args.raw_all()[1..].to_vec();
    let list = args.item(0)?.list_mut()?;
    for value in values {
        match end {
            End::Left => list.push_front(value),
            End::Right => list.push_back(value),
        }
    }
    Ok(RespValue::integer(list.len() as i64))
}

fn pop(ctx: &CommandContext, args: &mut Args, end: End, name: &str) -> CommandResult {
    let count = match args.len() {
        1 => None,
        2 => Some(parse_count(args.raw(1))?),
        _ => return Err(ctx.arity_error(name)),
    };

    let item = args.item(0)?;
    if !item.exists() {
        return Ok(if count.is_some() { RespValue::NullArray } else { RespValue::Null });
    }

    let list = item.list_mut()?;
    let take = count.unwrap_or(1).min(list.len());
    let mut popped = Vec::with_capacity(take);
    for _ in 0..take {
        let value = match end {
            End::Left => list.pop_front(),
            End::Right => list.pop_back(),
        };
        popped.extend(value);
    }

    Ok(match count {
        Some(_) => RespValue::bulk_array(popped),
        None => popped.pop().map_or(RespValue::Null, RespValue::BulkString),
    })
}

/// Shared body of BLPOP / BRPOP: `key [key ...] timeout`
fn blocking_pop(ctx: &mut CommandContext, args: &mut Args, end: End) -> CommandResult {
    let (timeout_arg, keys) = args.raw_all().split_last().ok_or(CommandError::Syntax)?;
    let timeout = parse_timeout(timeout_arg)?;
    let keys = keys.to_vec();

    let reply = ctx.block(timeout, |ctx, _first| {
        for key in &keys {
            let mut item = ctx.resolve(key, Some(ValueKind::List))?;
            if !item.exists() {
                continue;
            }
            let value = match end {
                End::Left => item.list_mut()?.pop_front(),
                End::Right => item.list_mut()?.pop_back(),
            };
            ctx.write_back(item, true);
            if let Some(value) = value {
                return Ok(Some(RespValue::bulk_array([key.clone(), value])));
            }
        }
        Ok(None)
    })?;

    Ok(reply.unwrap_or(RespValue::NullArray))
}

/// LPUSH command - Prepend one or multiple values to a list
///
/// Syntax: LPUSH key value [value ...]
pub struct LPushCommand;

impl Command for LPushCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        push(args, End::Left)
    }

    fn signature(&self) -> Signature {
        Signature::new("lpush", vec![Param::typed(ValueKind::List), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// RPUSH command - Append one or multiple values to a list
///
/// Syntax: RPUSH key value [value ...]
pub struct RPushCommand;

impl Command for RPushCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        push(args, End::Right)
    }

    fn signature(&self) -> Signature {
        Signature::new("rpush", vec![Param::typed(ValueKind::List), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// LPOP command - Remove and return the first elements of a list
///
/// Syntax: LPOP key [count]
pub struct LPopCommand;

impl Command for LPopCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        pop(ctx, args, End::Left, "lpop")
    }

    fn signature(&self) -> Signature {
        Signature::new("lpop", vec![Param::typed(ValueKind::List)]).repeat(vec![Param::Bytes])
    }
}

/// RPOP command - Remove and return the last elements of a list
///
/// Syntax: RPOP key [count]
pub struct RPopCommand;

impl Command for RPopCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        pop(ctx, args, End::Right, "rpop")
    }

    fn signature(&self) -> Signature {
        Signature::new("rpop", vec![Param::typed(ValueKind::List)]).repeat(vec![Param::Bytes])
    }
}

/// LLEN command - Length of a list
///
/// Syntax: LLEN key
pub struct LLenCommand;

impl Command for LLenCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.list()?.map_or(0, |l| l.len());
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("llen", vec![Param::typed(ValueKind::List).or_reply(RespValue::integer(0))])
    }
}

/// LRANGE command - Elements between two (possibly negative) indexes
///
/// Syntax: LRANGE key start stop
pub struct LRangeCommand;

impl Command for LRangeCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let (start, stop) = (args.int(1)?, args.int(2)?);
        let Some(list) = args.item_ref(0)?.list()? else {
            return Ok(RespValue::array(vec![]));
        };
        Ok(match clamp_range(start, stop, list.len()) {
            Some((from, to)) => bulk_list(list.range(from..=to)),
            None => RespValue::array(vec![]),
        })
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "lrange",
            vec![
                Param::typed(ValueKind::List).or_reply(RespValue::array(vec![])),
                Param::Int,
                Param::Int,
            ],
        )
    }
}

/// BLPOP command - Blocking left pop over several lists
///
/// Syntax: BLPOP key [key ...] timeout
pub struct BLPopCommand;

impl Command for BLPopCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        blocking_pop(ctx, args, End::Left)
    }

    fn signature(&self) -> Signature {
        Signature::new("blpop", vec![Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// BRPOP command - Blocking right pop over several lists
///
/// Syntax: BRPOP key [key ...] timeout
pub struct BRPopCommand;

impl Command for BRPopCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        blocking_pop(ctx, args, End::Right)
    }

    fn signature(&self) -> Signature {
        Signature::new("brpop", vec![Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}
