//! Set commands (SADD, SREM, SMEMBERS, SISMEMBER, SCARD, SSCAN)

use super::search::{scan_reply, ScanOptions};
use super::{Args, Command, CommandContext, Param, Signature};
use crate::error::CommandResult;
use crate::protocol::RespValue;
use crate::store::ValueKind;
use bytes::Bytes;
use std::collections::HashSet;

fn sorted_members(set: &HashSet<Bytes>) -> Vec<Bytes> {
    let mut members: Vec<Bytes> = set.iter().cloned().collect();
    members.sort();
    members
}

/// SADD command - Add members to a set
///
/// Syntax: SADD key member [member ...]
pub struct SAddCommand;

impl Command for SAddCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let members: Vec<Bytes> = args.raw_all()[1..].to_vec();
        let set = args.item(0)?.set_members_mut()?;
        let added = members.into_iter().filter(|m| set.insert(m.clone())).count();
        Ok(RespValue::integer(added as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("sadd", vec![Param::typed(ValueKind::Set), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// SREM command - Remove members from a set
///
/// Syntax: SREM key member [member ...]
pub struct SRemCommand;

impl Command for SRemCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let members: Vec<Bytes> = args.raw_all()[1..].to_vec();
        let set = args.item(0)?.set_members_mut()?;
        let removed = members.iter().filter(|m| set.remove(*m)).count();
        Ok(RespValue::integer(removed as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("srem", vec![Param::typed(ValueKind::Set).or_reply(RespValue::integer(0)), Param::Bytes])
            .repeat(vec![Param::Bytes])
    }
}

/// SMEMBERS command - All members of a set (sorted)
///
/// Syntax: SMEMBERS key
pub struct SMembersCommand;

impl Command for SMembersCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let members = args.item_ref(0)?.set_members()?.map(sorted_members).unwrap_or_default();
        Ok(RespValue::bulk_array(members))
    }

    fn signature(&self) -> Signature {
        Signature::new("smembers", vec![Param::typed(ValueKind::Set).or_reply(RespValue::array(vec![]))])
    }
}

/// SISMEMBER command - Whether a value is a member of a set
///
/// Syntax: SISMEMBER key member
pub struct SIsMemberCommand;

impl Command for SIsMemberCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let member = args.raw(1).clone();
        let found = args.item_ref(0)?.set_members()?.is_some_and(|s| s.contains(&member));
        Ok(RespValue::integer(found as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "sismember",
            vec![Param::typed(ValueKind::Set).or_reply(RespValue::integer(0)), Param::Bytes],
        )
    }
}

/// SCARD command - Number of members in a set
///
/// Syntax: SCARD key
pub struct SCardCommand;

impl Command for SCardCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.set_members()?.map_or(0, |s| s.len());
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("scard", vec![Param::typed(ValueKind::Set).or_reply(RespValue::integer(0))])
    }
}

/// SSCAN command - Incrementally iterate set members
///
/// Syntax: SSCAN key cursor [MATCH pattern] [COUNT count]
pub struct SScanCommand;

impl Command for SScanCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let options = ScanOptions::parse(&args.raw_all()[1..], false)?;
        let Some(set) = args.item_ref(0)?.set_members()? else {
            return Ok(scan_reply(0, Vec::new()));
        };

        let members = sorted_members(set);
        let (next, window) = options.page(&members);
        let found = window.iter().filter(|m| options.matches(m)).cloned().collect();
        Ok(scan_reply(next, found))
    }

    fn signature(&self) -> Signature {
        Signature::new("sscan", vec![Param::typed(ValueKind::Set), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{bulk, run, session};
    use super::*;

    #[test]
    fn test_sadd_srem() {
        let mut s = session();
        assert_eq!(run(&mut s, &["SADD", "s", "a", "b", "a"]), RespValue::integer(2));
        assert_eq!(run(&mut s, &["SADD", "s", "b", "c"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["SCARD", "s"]), RespValue::integer(3));
        assert_eq!(run(&mut s, &["SMEMBERS", "s"]), bulk(&["a", "b", "c"]));
        assert_eq!(run(&mut s, &["SREM", "s", "a", "x"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["SISMEMBER", "s", "b"]), RespValue::integer(1));
        assert_eq!(run(&mut s, &["SISMEMBER", "s", "a"]), RespValue::integer(0));
    }

    #[test]
    fn test_empty_set_is_removed() {
        let mut s = session();
        run(&mut s, &["SADD", "s", "a"]);
        run(&mut s, &["SREM", "s", "a"]);
        assert_eq!(run(&mut s, &["EXISTS", "s"]), RespValue::integer(0));
        assert_eq!(run(&mut s, &["SMEMBERS", "s"]), bulk(&[]));
        assert_eq!(run(&mut s, &["SCARD", "s"]), RespValue::integer(0));
    }

    #[test]
    fn test_sscan_covers_all_members() {
        let mut s = session();
        let members: Vec<String> = (0..20).map(|i| format!("m{:02}", i)).collect();
        let mut cmd = vec!["SADD", "s"];
        cmd.extend(members.iter().map(String::as_str));
        run(&mut s, &cmd);

        let mut cursor = "0".to_string();
        let mut seen = Vec::new();
        loop {
            let reply = run(&mut s, &["SSCAN", "s", cursor.as_str(), "COUNT", "3"]);
            let parts = reply.as_array().unwrap().clone();
            seen.extend(parts[1].as_array().unwrap().iter().cloned());
            cursor = String::from_utf8(parts[0].as_bulk_string().unwrap().to_vec()).unwrap();
            if cursor == "0" {
                break;
            }
        }
        assert_eq!(seen.len(), 20);
    }
}
