//! Admin commands (DBSIZE, FLUSHDB, FLUSHALL, TIME)

use super::{is_keyword, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use tracing::info;

/// Accepts an optional ASYNC / SYNC modifier; both behave the same here
fn check_flush_mode(args: &Args) -> Result<(), CommandError> {
    match args.len() {
        0 => Ok(()),
        1 if is_keyword(args.raw(0), "ASYNC") || is_keyword(args.raw(0), "SYNC") => Ok(()),
        _ => Err(CommandError::Syntax),
    }
}

/// DBSIZE command - Number of keys in the selected database
///
/// Syntax: DBSIZE
pub struct DbSizeCommand;

impl Command for DbSizeCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        Ok(RespValue::integer(ctx.db().len() as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("dbsize", vec![])
    }
}

/// FLUSHDB command - Remove all keys from the current database
///
/// Syntax: FLUSHDB [ASYNC|SYNC]
pub struct FlushDbCommand;

impl Command for FlushDbCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        check_flush_mode(args)?;
        info!("FLUSHDB on db{}", ctx.session.db);
        ctx.db().clear();
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("flushdb", vec![]).repeat(vec![Param::Bytes])
    }
}

/// FLUSHALL command - Remove all keys from every database
///
/// Syntax: FLUSHALL [ASYNC|SYNC]
pub struct FlushAllCommand;

impl Command for FlushAllCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        check_flush_mode(args)?;
        info!("FLUSHALL");
        for db in ctx.state.dbs.iter_mut() {
            db.clear();
        }
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("flushall", vec![]).repeat(vec![Param::Bytes])
    }
}

/// TIME command - Current server time as `[seconds, microseconds]`
///
/// Syntax: TIME
pub struct TimeCommand;

impl Command for TimeCommand {
    fn execute(&self, ctx: &mut CommandContext, _args: &mut Args) -> CommandResult {
        let now = ctx.now_ms();
        Ok(RespValue::bulk_array([
            (now / 1000).to_string(),
            ((now % 1000) * 1000).to_string(),
        ]))
    }

    fn signature(&self) -> Signature {
        Signature::new("time", vec![])
    }
}
