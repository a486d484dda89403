//! Key commands (DEL, UNLINK, EXISTS, TYPE, RENAME)

use super::{Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;

/// Delete every distinct resolved key, returning how many existed
fn delete_all(args: &mut Args) -> i64 {
    let mut deleted = 0;
    for item in args.items_mut() {
        if item.exists() {
            item.clear();
            deleted += 1;
        }
    }
    deleted
}

/// DEL command - Delete one or more keys
///
/// Syntax: DEL key [key ...]
pub struct DelCommand;

impl Command for DelCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        Ok(RespValue::integer(delete_all(args)))
    }

    fn signature(&self) -> Signature {
        Signature::new("del", vec![Param::key()]).repeat(vec![Param::key()])
    }
}

/// UNLINK command - Same as DEL; memory is reclaimed immediately anyway
///
/// Syntax: UNLINK key [key ...]
pub struct UnlinkCommand;

impl Command for UnlinkCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        Ok(RespValue::integer(delete_all(args)))
    }

    fn signature(&self) -> Signature {
        Signature::new("unlink", vec![Param::key()]).repeat(vec![Param::key()])
    }
}

/// EXISTS command - Count existing keys; repeated keys count every time
///
/// Syntax: EXISTS key [key ...]
pub struct ExistsCommand;

impl Command for ExistsCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let mut count = 0;
        for i in 0..args.len() {
            if args.item_ref(i)?.exists() {
                count += 1;
            }
        }
        Ok(RespValue::integer(count))
    }

    fn signature(&self) -> Signature {
        Signature::new("exists", vec![Param::key()]).repeat(vec![Param::key()])
    }
}

/// TYPE command - Name of the type stored at key
///
/// Syntax: TYPE key
pub struct TypeCommand;

impl Command for TypeCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let name = args.item_ref(0)?.kind().map_or("none", |kind| kind.type_name());
        Ok(RespValue::simple_string(name))
    }

    fn signature(&self) -> Signature {
        Signature::new("type", vec![Param::key()])
    }
}

/// RENAME command - Move a value (and its TTL) to another key
///
/// Syntax: RENAME key newkey
pub struct RenameCommand;

impl Command for RenameCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        if !args.item_ref(0)?.exists() {
            return Err(CommandError::NoSuchKey);
        }
        if args.raw(0) == args.raw(1) {
            return Ok(RespValue::ok());
        }

        let (source, destination) = args.item_pair(0, 1)?;
        if let Some((value, expire_at)) = source.take() {
            destination.set(value);
            destination.set_expire_at(expire_at);
        }
        Ok(RespValue::ok())
    }

    fn signature(&self) -> Signature {
        Signature::new("rename", vec![Param::key(), Param::key()])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{clocked_session, run, session};
    use super::*;

    #[test]
    fn test_del_counts_distinct_keys() {
        let mut s = session();
        run(&mut s, &["SET", "a", "1"]);
        run(&mut s, &["SET", "b", "2"]);
        assert_eq!(run(&mut s, &["DEL", "a", "a", "b", "c"]), RespValue::integer(2));
        assert_eq!(run(&mut s, &["DBSIZE"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["UNLINK", "a"]), RespValue::integer(0));
    }

    #[test]
    fn test_exists_counts_repeats() {
        let mut s = session();
        run(&mut s, &["SET", "a", "1"]);
        assert_eq!(run(&mut s, &["EXISTS", "a", "a", "b"]), RespValue::integer(2));
    }

    #[test]
    fn test_type() {
        let mut s = session();
        run(&mut s, &["SET", "s", "1"]);
        run(&mut s, &["RPUSH", "l", "x"]);
        run(&mut s, &["ZADD", "z", "1", "m"]);
        assert_eq!(run(&mut s, &["TYPE", "s"]), RespValue::simple_string("string"));
        assert_eq!(run(&mut s, &["TYPE", "l"]), RespValue::simple_string("list"));
        assert_eq!(run(&mut s, &["TYPE", "z"]), RespValue::simple_string("zset"));
        assert_eq!(run(&mut s, &["TYPE", "nope"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_rename_moves_value_and_ttl() {
        let (mut s, _clock) = clocked_session(1_000);
        run(&mut s, &["SET", "a", "v", "PX", "5000"]);
        assert_eq!(run(&mut s, &["RENAME", "a", "b"]), RespValue::ok());
        assert_eq!(run(&mut s, &["GET", "a"]), RespValue::Null);
        assert_eq!(run(&mut s, &["GET", "b"]), RespValue::bulk_string("v"));
        assert_eq!(run(&mut s, &["PTTL", "b"]), RespValue::integer(5000));
    }

    #[test]
    fn test_rename_errors() {
        let mut s = session();
        assert_eq!(run(&mut s, &["RENAME", "missing", "b"]), RespValue::error("ERR no such key"));
        run(&mut s, &["SET", "a", "v"]);
        assert_eq!(run(&mut s, &["RENAME", "a", "a"]), RespValue::ok());
        assert_eq!(run(&mut s, &["GET", "a"]), RespValue::bulk_string("v"));
    }
}
