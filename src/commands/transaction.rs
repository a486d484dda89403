//! Transaction commands (MULTI, EXEC, DISCARD, WATCH, UNWATCH)
//!
//! The queuing itself happens in the dispatcher; these handlers only open,
//! run or drop the block and manage watched keys.

use super::{Args, Command, CommandContext, Flags, Param, Signature};
use crate::error::CommandResult;
use crate::protocol::RespValue;

/// MULTI command - Start queuing commands
///
/// Syntax: MULTI
pub struct MultiCommand;

impl Command for MultiCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        ctx.multi()?;
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("multi", vec![]).flags(Flags::TX_EXEMPT | Flags::NO_SCRIPT)
    }
}

/// EXEC command - Run every queued command
///
/// Syntax: EXEC
pub struct ExecCommand;

impl Command for ExecCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        ctx.exec()
    }

    fn signature(&self) -> Signature {
        Signature::new("exec", vec![]).flags(Flags::TX_EXEMPT | Flags::NO_SCRIPT)
    }
}

/// DISCARD command - Drop the queued commands
///
/// Syntax: DISCARD
pub struct DiscardCommand;

impl Command for DiscardCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        ctx.discard()?;
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("discard", vec![]).flags(Flags::TX_EXEMPT | Flags::NO_SCRIPT)
    }
}

/// WATCH command - Abort the next EXEC if any of the keys change
///
/// Syntax: WATCH key [key ...]
pub struct WatchCommand;

impl Command for WatchCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        ctx.watch(args.raw_all())?;
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("watch", vec![Param::Bytes])
            .repeat(vec![Param::Bytes])
            .flags(Flags::TX_EXEMPT | Flags::NO_SCRIPT)
    }
}

/// UNWATCH command - Forget every watched key
///
/// Syntax: UNWATCH
pub struct UnwatchCommand;

impl Command for UnwatchCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        ctx.unwatch();
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("unwatch", vec![]).flags(Flags::NO_SCRIPT)
    }
}
