//! TTL commands (EXPIRE, PEXPIRE, EXPIREAT, PEXPIREAT, TTL, PTTL, PERSIST)
//!
//! Deadlines are absolute logical milliseconds. A deadline at or before the
//! current logical time deletes the key right away.

use super::{is_keyword, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;

/// How the second argument of an EXPIRE-family command is read
#[derive(Debug, Clone, Copy)]
struct ExpireUnit {
    name: &'static str,
    /// Milliseconds per unit
    scale: i64,
    /// Absolute timestamp rather than a delay
    absolute: bool,
}

/// NX / XX / GT / LT
#[derive(Debug, Default, Clone, Copy)]
struct ExpireCondition {
    nx: bool,
    xx: bool,
    gt: bool,
    lt: bool,
}

impl ExpireCondition {
    fn parse(options: &[bytes::Bytes]) -> Result<Self, CommandError> {
        let mut cond = ExpireCondition::default();
        for option in options {
            if is_keyword(option, "NX") {
                cond.nx = true;
            } else if is_keyword(option, "XX") {
                cond.xx = true;
            } else if is_keyword(option, "GT") {
                cond.gt = true;
            } else if is_keyword(option, "LT") {
                cond.lt = true;
            } else {
                return Err(CommandError::custom(
                    "ERR",
                    format!("Unsupported option {}", String::from_utf8_lossy(option)),
                ));
            }
        }

        if cond.nx && (cond.xx || cond.gt || cond.lt) {
            return Err(CommandError::custom(
                "ERR",
                "NX and XX, GT or LT options at the same time are not compatible",
            ));
        }
        if cond.gt && cond.lt {
            return Err(CommandError::custom("ERR", "GT and LT options at the same time are not compatible"));
        }
        Ok(cond)
    }

    /// Whether a new deadline may replace `current` (`None` = persistent)
    fn allows(&self, current: Option<u64>, new: i64) -> bool {
        match current {
            None => !(self.xx || self.gt),
            Some(at) => {
                if self.nx {
                    return false;
                }
                if self.gt && new <= at as i64 {
                    return false;
                }
                if self.lt && new >= at as i64 {
                    return false;
                }
                true
            }
        }
    }
}

fn expire_generic(ctx: &mut CommandContext, args: &mut Args, unit: ExpireUnit) -> CommandResult {
    let amount = args.int(1)?;
    let cond = ExpireCondition::parse(&args.raw_all()[2..])?;
    let now = ctx.now_ms() as i64;

    let invalid = || CommandError::InvalidExpireTime(unit.name.to_string());
    let offset = amount.checked_mul(unit.scale).ok_or_else(invalid)?;
    let deadline = if unit.absolute {
        offset
    } else {
        offset.checked_add(now).ok_or_else(invalid)?
    };

    let item = args.item(0)?;
    if !item.exists() {
        return Ok(RespValue::integer(0));
    }
    if !cond.allows(item.expire_at(), deadline) {
        return Ok(RespValue::integer(0));
    }

    if deadline <= now {
        item.clear();
    } else {
        item.set_expire_at(Some(deadline as u64));
    }
    Ok(RespValue::integer(1))
}

fn expire_signature(name: &'static str) -> Signature {
    Signature::new(name, vec![Param::key(), Param::Int]).repeat(vec![Param::Bytes])
}

/// EXPIRE command - Set a key's time to live in seconds
///
/// Syntax: EXPIRE key seconds [NX|XX|GT|LT]
pub struct ExpireCommand;

impl Command for ExpireCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let unit = ExpireUnit { name: "expire", scale: 1000, absolute: false };
        expire_generic(ctx, args, unit)
    }

    fn signature(&self) -> Signature {
        expire_signature("expire")
    }
}

/// PEXPIRE command - Set a key's time to live in milliseconds
///
/// Syntax: PEXPIRE key milliseconds [NX|XX|GT|LT]
pub struct PExpireCommand;

impl Command for PExpireCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let unit = ExpireUnit { name: "pexpire", scale: 1, absolute: false };
        expire_generic(ctx, args, unit)
    }

    fn signature(&self) -> Signature {
        expire_signature("pexpire")
    }
}

/// EXPIREAT command - Expire at a Unix time in seconds
///
/// Syntax: EXPIREAT key unix-time-seconds [NX|XX|GT|LT]
pub struct ExpireAtCommand;

impl Command for ExpireAtCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let unit = ExpireUnit { name: "expireat", scale: 1000, absolute: true };
        expire_generic(ctx, args, unit)
    }

    fn signature(&self) -> Signature {
        expire_signature("expireat")
    }
}

/// PEXPIREAT command - Expire at a Unix time in milliseconds
///
/// Syntax: PEXPIREAT key unix-time-milliseconds [NX|XX|GT|LT]
pub struct PExpireAtCommand;

impl Command for PExpireAtCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let unit = ExpireUnit { name: "pexpireat", scale: 1, absolute: true };
        expire_generic(ctx, args, unit)
    }

    fn signature(&self) -> Signature {
        expire_signature("pexpireat")
    }
}

/// Remaining time in ms: -2 when missing, -1 when persistent
fn remaining_ms(ctx: &CommandContext, args: &Args) -> Result<i64, CommandError> {
    let item = args.item_ref(0)?;
    if !item.exists() {
        return Ok(-2);
    }
    Ok(match item.expire_at() {
        None => -1,
        Some(at) => at.saturating_sub(ctx.now_ms()) as i64,
    })
}

/// TTL command - Remaining time to live in seconds (rounded)
///
/// Syntax: TTL key
pub struct TtlCommand;

impl Command for TtlCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let ms = remaining_ms(ctx, args)?;
        let secs = if ms < 0 { ms } else { (ms + 500) / 1000 };
        Ok(RespValue::integer(secs))
    }

    fn signature(&self) -> Signature {
        Signature::new("ttl", vec![Param::key()])
    }
}

/// PTTL command - Remaining time to live in milliseconds
///
/// Syntax: PTTL key
pub struct PTtlCommand;

impl Command for PTtlCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        Ok(RespValue::integer(remaining_ms(ctx, args)?))
    }

    fn signature(&self) -> Signature {
        Signature::new("pttl", vec![Param::key()])
    }
}

/// PERSIST command - Remove the expiration from a key
///
/// Syntax: PERSIST key
pub struct PersistCommand;

impl Command for PersistCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let item = args.item(0)?;
        if item.expire_at().is_none() {
            return Ok(RespValue::integer(0));
        }
        item.set_expire_at(None);
        Ok(RespValue::integer(1))
    }

    fn signature(&self) -> Signature {
        Signature::new("persist", vec![Param::key()])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{clocked_session, run};
    use super::*;

    #[test]
    fn test_expire_and_ttl() {
        let (mut s, clock) = clocked_session(100_000);
        run(&mut s, &["SET", "k", "v"]);
        assert_eq!(run(&mut s, &["TTL", "k"]), RespValue::integer(-1));
        assert_eq!(run(&mut s, &["TTL", "missing"]), RespValue::integer(-2));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "10"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["TTL", "k"]), RespValue::integer(10));
        clock.advance_ms(2_400);
        assert_eq!(run(&mut s, &["TTL", "k"]), RespValue::integer(8));
        assert_eq!(run(&mut s, &["PTTL", "k"]), RespValue::integer(7_600));
        clock.advance_ms(7_601);
        assert_eq!(run(&mut s, &["GET", "k"]), RespValue::Null);
        assert_eq!(run(&mut s, &["EXPIRE", "k", "10"]), RespValue::integer(0));
    }

    #[test]
    fn test_expire_at_boundary_still_visible() {
        let (mut s, clock) = clocked_session(1_000);
        run(&mut s, &["SET", "k", "v"]);
        run(&mut s, &["PEXPIREAT", "k", "1500"]);
        clock.set_ms(1_500);
        assert_eq!(run(&mut s, &["GET", "k"]), RespValue::bulk_string("v"));
        clock.set_ms(1_501);
        assert_eq!(run(&mut s, &["GET", "k"]), RespValue::Null);
    }

    #[test]
    fn test_past_deadline_deletes() {
        let (mut s, _clock) = clocked_session(50_000);
        run(&mut s, &["SET", "k", "v"]);
        assert_eq!(run(&mut s, &["EXPIREAT", "k", "10"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["EXISTS", "k"]), RespValue::integer(0));
        run(&mut s, &["SET", "k", "v"]);
        assert_eq!(run(&mut s, &["PEXPIRE", "k", "-1"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["EXISTS", "k"]), RespValue::integer(0));
    }

    #[test]
    fn test_conditions() {
        let (mut s, _clock) = clocked_session(0);
        run(&mut s, &["SET", "k", "v"]);
        assert_eq!(run(&mut s, &["EXPIRE", "k", "100", "XX"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "100", "GT"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "100", "NX"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "200", "NX"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "50", "GT"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "200", "GT"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["EXPIRE", "k", "50", "LT"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["TTL", "k"]), RespValue::integer(50));
        assert!(run(&mut s, &["EXPIRE", "k", "5", "NX", "XX"]).is_error());
        assert!(run(&mut s, &["EXPIRE", "k", "5", "GT", "LT"]).is_error());
        assert!(run(&mut s, &["EXPIRE", "k", "5", "SOON"]).is_error());
    }

    #[test]
    fn test_overflow_is_invalid_expire_time() {
        let (mut s, _clock) = clocked_session(0);
        run(&mut s, &["SET", "k", "v"]);
        assert_eq!(
            run(&mut s, &["EXPIRE", "k", "9223372036854775807"]),
            RespValue::error("ERR invalid expire time in 'expire' command")
        );
    }

    #[test]
    fn test_persist() {
        let (mut s, _clock) = clocked_session(0);
        run(&mut s, &["SET", "k", "v", "EX", "100"]);
        assert_eq!(run(&mut s, &["PERSIST", "k"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["TTL", "k"]), RespValue::integer(-1));
        assert_eq!(run(&mut s, &["PERSIST", "k"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["PERSIST", "missing"]), RespValue::integer(0));
    }
}
