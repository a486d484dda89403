//! String commands (GET, SET, MGET, APPEND, STRLEN)

use super::{is_keyword, signature::parse_int, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::{Value, ValueKind};
use bytes::Bytes;

/// GET command - Get the value of a key
///
/// Syntax: GET key
pub struct GetCommand;

impl Command for GetCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        match args.item_ref(0)?.string()? {
            Some(value) => Ok(RespValue::bulk_string(value.clone())),
            None => Ok(RespValue::null()),
        }
    }

    fn signature(&self) -> Signature {
        Signature::new("get", vec![Param::typed(ValueKind::String).or_reply(RespValue::Null)])
    }
}

/// Expiry requested by SET
#[derive(Debug, Clone, Copy, PartialEq)]
enum SetExpiry {
    None,
    KeepTtl,
    /// Absolute deadline in ms
    At(i64),
}

#[derive(Debug)]
struct SetOptions {
    expiry: SetExpiry,
    nx: bool,
    xx: bool,
    get: bool,
}

impl SetOptions {
    fn parse(raw: &[Bytes], now: i64) -> Result<Self, CommandError> {
        let mut options = SetOptions {
            expiry: SetExpiry::None,
            nx: false,
            xx: false,
            get: false,
        };

        let mut i = 0;
        while i < raw.len() {
            let arg = &raw[i];
            if is_keyword(arg, "NX") && !options.xx {
                options.nx = true;
            } else if is_keyword(arg, "XX") && !options.nx {
                options.xx = true;
            } else if is_keyword(arg, "GET") {
                options.get = true;
            } else if is_keyword(arg, "KEEPTTL") && options.expiry == SetExpiry::None {
                options.expiry = SetExpiry::KeepTtl;
            } else if options.expiry == SetExpiry::None
                && ["EX", "PX", "EXAT", "PXAT"].iter().any(|kw| is_keyword(arg, kw))
            {
                let value = raw.get(i + 1).ok_or(CommandError::Syntax)?;
                let amount = parse_int(value)?;
                if amount <= 0 {
                    return Err(CommandError::InvalidExpireTime("set".to_string()));
                }
                let invalid = || CommandError::InvalidExpireTime("set".to_string());
                let deadline = if is_keyword(arg, "EX") {
                    amount.checked_mul(1000).and_then(|ms| ms.checked_add(now))
                } else if is_keyword(arg, "PX") {
                    amount.checked_add(now)
                } else if is_keyword(arg, "EXAT") {
                    amount.checked_mul(1000)
                } else {
                    Some(amount)
                };
                options.expiry = SetExpiry::At(deadline.ok_or_else(invalid)?);
                i += 1;
            } else {
                return Err(CommandError::Syntax);
            }
            i += 1;
        }
        Ok(options)
    }
}

/// SET command - Set a key to a string value
///
/// Syntax: SET key value [NX|XX] [GET] [EX seconds|PX milliseconds|EXAT unix-time-seconds|PXAT unix-time-milliseconds|KEEPTTL]
pub struct SetCommand;

impl Command for SetCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let now = ctx.now_ms() as i64;
        let options = SetOptions::parse(&args.raw_all()[2..], now)?;
        let value = args.raw(1).clone();

        let item = args.item(0)?;
        let old = if options.get { item.string()?.cloned() } else { None };
        let previous = || old.clone().map_or(RespValue::Null, |v| RespValue::bulk_string(v));

        let exists = item.exists();
        if (options.nx && exists) || (options.xx && !exists) {
            return Ok(if options.get { previous() } else { RespValue::Null });
        }

        item.set(Value::String(value));
        match options.expiry {
            SetExpiry::KeepTtl => {}
            SetExpiry::None => item.set_expire_at(None),
            SetExpiry::At(deadline) if deadline <= now => item.clear(),
            SetExpiry::At(deadline) => item.set_expire_at(Some(deadline as u64)),
        }

        Ok(if options.get { previous() } else { RespValue::ok() })
    }

    fn signature(&self) -> Signature {
        Signature::new("set", vec![Param::key(), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// MGET command - Values of several keys; non-strings read as nil
///
/// Syntax: MGET key [key ...]
pub struct MGetCommand;

impl Command for MGetCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let mut values = Vec::with_capacity(args.len());
        for i in 0..args.len() {
            values.push(match args.item_ref(i)?.value() {
                Some(Value::String(bytes)) => RespValue::bulk_string(bytes.clone()),
                _ => RespValue::Null,
            });
        }
        Ok(RespValue::array(values))
    }

    fn signature(&self) -> Signature {
        Signature::new("mget", vec![Param::key()]).repeat(vec![Param::key()])
    }
}

/// APPEND command - Append to a string, creating it when absent
///
/// Syntax: APPEND key value
pub struct AppendCommand;

impl Command for AppendCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let suffix = args.raw(1).clone();
        let current = args.item(0)?.string_mut()?;
        let mut joined = Vec::with_capacity(current.len() + suffix.len());
        joined.extend_from_slice(current);
        joined.extend_from_slice(&suffix);
        *current = Bytes::from(joined);
        Ok(RespValue::integer(current.len() as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("append", vec![Param::typed(ValueKind::String), Param::Bytes])
    }
}

/// STRLEN command - Length of a string value
///
/// Syntax: STRLEN key
pub struct StrLenCommand;

impl Command for StrLenCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.string()?.map_or(0, Bytes::len);
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("strlen", vec![Param::typed(ValueKind::String).or_reply(RespValue::integer(0))])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{clocked_session, run, session};
    use super::*;

    #[test]
    fn test_set_get() {
        let mut s = session();
        assert_eq!(run(&mut s, &["SET", "mykey", "myvalue"]), RespValue::ok());
        assert_eq!(run(&mut s, &["GET", "mykey"]), RespValue::bulk_string("myvalue"));
        assert_eq!(run(&mut s, &["GET", "nonexistent"]), RespValue::Null);
    }

    #[test]
    fn test_get_wrong_type() {
        let mut s = session();
        run(&mut s, &["RPUSH", "l", "a"]);
        assert_eq!(
            run(&mut s, &["GET", "l"]),
            RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
        // SET overwrites any type
        assert_eq!(run(&mut s, &["SET", "l", "v"]), RespValue::ok());
        assert_eq!(run(&mut s, &["GET", "l"]), RespValue::bulk_string("v"));
    }

    #[test]
    fn test_set_nx_xx_get() {
        let mut s = session();
        assert_eq!(run(&mut s, &["SET", "k", "1", "XX"]), RespValue::Null);
        assert_eq!(run(&mut s, &["SET", "k", "1", "NX"]), RespValue::ok());
        assert_eq!(run(&mut s, &["SET", "k", "2", "NX"]), RespValue::Null);
        assert_eq!(run(&mut s, &["SET", "k", "3", "XX", "GET"]), RespValue::bulk_string("1"));
        assert_eq!(run(&mut s, &["SET", "new", "x", "GET"]), RespValue::Null);
        assert_eq!(run(&mut s, &["SET", "k", "v", "NX", "XX"]), RespValue::error("ERR syntax error"));
    }

    #[test]
    fn test_set_expiry_options() {
        let (mut s, clock) = clocked_session(10_000);
        run(&mut s, &["SET", "a", "v", "EX", "10"]);
        assert_eq!(run(&mut s, &["PTTL", "a"]), RespValue::integer(10_000));
        run(&mut s, &["SET", "b", "v", "PXAT", "15000"]);
        assert_eq!(run(&mut s, &["PTTL", "b"]), RespValue::integer(5_000));

        run(&mut s, &["SET", "a", "w", "KEEPTTL"]);
        assert_eq!(run(&mut s, &["PTTL", "a"]), RespValue::integer(10_000));
        run(&mut s, &["SET", "a", "x"]);
        assert_eq!(run(&mut s, &["PTTL", "a"]), RespValue::integer(-1));

        assert_eq!(
            run(&mut s, &["SET", "c", "v", "EX", "0"]),
            RespValue::error("ERR invalid expire time in 'set' command")
        );
        assert_eq!(run(&mut s, &["SET", "c", "v", "EX", "ten"]), RespValue::error("ERR value is not an integer or out of range"));
        assert_eq!(run(&mut s, &["SET", "c", "v", "EX", "1", "PX", "1"]), RespValue::error("ERR syntax error"));

        clock.advance_ms(5_001);
        assert_eq!(run(&mut s, &["GET", "b"]), RespValue::Null);
    }

    #[test]
    fn test_mget() {
        let mut s = session();
        run(&mut s, &["SET", "a", "1"]);
        run(&mut s, &["RPUSH", "l", "x"]);
        assert_eq!(
            run(&mut s, &["MGET", "a", "l", "missing"]),
            RespValue::array(vec![RespValue::bulk_string("1"), RespValue::Null, RespValue::Null])
        );
    }

    #[test]
    fn test_append_strlen() {
        let mut s = session();
        assert_eq!(run(&mut s, &["APPEND", "k", "Hello"]), RespValue::integer(5));
        assert_eq!(run(&mut s, &["APPEND", "k", " World"]), RespValue::integer(11));
        assert_eq!(run(&mut s, &["GET", "k"]), RespValue::bulk_string("Hello World"));
        assert_eq!(run(&mut s, &["STRLEN", "k"]), RespValue::integer(11));
        assert_eq!(run(&mut s, &["STRLEN", "missing"]), RespValue::integer(0));
    }
}
