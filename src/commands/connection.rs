//! Connection commands (PING, ECHO, SELECT, SWAPDB, QUIT)

use super::{Args, Command, CommandContext, Param, Signature};
use crate::config::ServerType;
use crate::error::CommandResult;
use crate::protocol::RespValue;
use bytes::Bytes;
use tracing::debug;

/// PING command - Test connection
///
/// Syntax: PING [message]
///
/// With active subscriptions the reply is the array `["pong", message]`.
pub struct PingCommand;

impl Command for PingCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        if args.len() > 1 {
            return Err(ctx.arity_error("ping"));
        }

        if ctx.session.is_subscribed() {
            let message = if args.is_empty() { Bytes::new() } else { args.raw(0).clone() };
            return Ok(RespValue::bulk_array([Bytes::from_static(b"pong"), message]));
        }

        if args.is_empty() {
            Ok(RespValue::simple_string("PONG"))
        } else {
            Ok(RespValue::bulk_string(args.raw(0).clone()))
        }
    }

    fn signature(&self) -> Signature {
        Signature::new("ping", vec![]).repeat(vec![Param::Bytes])
    }
}

/// ECHO command - Echo the given string
///
/// Syntax: ECHO message
pub struct EchoCommand;

impl Command for EchoCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        Ok(RespValue::bulk_string(args.raw(0).clone()))
    }

    fn signature(&self) -> Signature {
        Signature::new("echo", vec![Param::Bytes])
    }
}

/// SELECT command - Change the selected database
///
/// Syntax: SELECT index
pub struct SelectCommand;

impl Command for SelectCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let index = args.db_index(0)?;
        debug!("Session {} selects db{}", ctx.session.id, index);
        ctx.session.db = index;
        // the new database has not been swept for this command yet
        ctx.db().sweep_expired();
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("select", vec![Param::DbIndex])
    }
}

/// SWAPDB command - Exchange the contents of two databases
///
/// Syntax: SWAPDB index1 index2
pub struct SwapDbCommand;

impl Command for SwapDbCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let a = args.db_index(0)?;
        let b = args.db_index(1)?;
        if a != b {
            let (low, high) = (a.min(b), a.max(b));
            let (left, right) = ctx.state.dbs.split_at_mut(high);
            left[low].swap_contents(&mut right[0]);
        }
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("swapdb", vec![Param::DbIndex, Param::DbIndex])
            .server_types(&[ServerType::Redis, ServerType::Valkey])
    }
}

/// QUIT command - Close the connection after replying
///
/// Syntax: QUIT
pub struct QuitCommand;

impl Command for QuitCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        ctx.session.quit = true;
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("quit", vec![])
    }
}
