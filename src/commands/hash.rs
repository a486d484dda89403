//! Hash commands (HSET, HGET, HDEL, HLEN, HGETALL, HSCAN)

use super::search::{scan_reply, ScanOptions};
use super::{Args, Command, CommandContext, Param, Signature};
use crate::error::CommandResult;
use crate::protocol::RespValue;
use crate::store::ValueKind;
use bytes::Bytes;
use std::collections::HashMap;

/// Field/value pairs sorted by field
fn sorted_pairs(hash: &HashMap<Bytes, Bytes>) -> Vec<(&Bytes, &Bytes)> {
    let mut pairs: Vec<(&Bytes, &Bytes)> = hash.iter().collect();
    pairs.sort();
    pairs
}

/// HSET command - Set fields in the hash stored at key
///
/// Syntax: HSET key field value [field value ...]
pub struct HSetCommand;

impl Command for HSetCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let pairs: Vec<Bytes> = args.raw_all()[1..].to_vec();
        let hash = args.item(0)?.hash_mut()?;
        let mut added = 0;
        for pair in pairs.chunks_exact(2) {
            if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                added += 1;
            }
        }
        Ok(RespValue::integer(added))
    }

    fn signature(&self) -> Signature {
        Signature::new("hset", vec![Param::typed(ValueKind::Hash), Param::Bytes, Param::Bytes])
            .repeat(vec![Param::Bytes, Param::Bytes])
    }
}

/// HGET command - Value of a hash field
///
/// Syntax: HGET key field
pub struct HGetCommand;

impl Command for HGetCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let field = args.raw(1).clone();
        let value = args.item_ref(0)?.hash()?.and_then(|h| h.get(&field)).cloned();
        Ok(value.map_or(RespValue::Null, RespValue::BulkString))
    }

    fn signature(&self) -> Signature {
        Signature::new("hget", vec![Param::typed(ValueKind::Hash).or_reply(RespValue::Null), Param::Bytes])
    }
}

/// HDEL command - Delete hash fields; the key goes away with the last one
///
/// Syntax: HDEL key field [field ...]
pub struct HDelCommand;

impl Command for HDelCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let fields: Vec<Bytes> = args.raw_all()[1..].to_vec();
        let hash = args.item(0)?.hash_mut()?;
        let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
        Ok(RespValue::integer(removed as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("hdel", vec![Param::typed(ValueKind::Hash).or_reply(RespValue::integer(0)), Param::Bytes])
            .repeat(vec![Param::Bytes])
    }
}

/// HLEN command - Number of fields in a hash
///
/// Syntax: HLEN key
pub struct HLenCommand;

impl Command for HLenCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.hash()?.map_or(0, |h| h.len());
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("hlen", vec![Param::typed(ValueKind::Hash).or_reply(RespValue::integer(0))])
    }
}

/// HGETALL command - All fields and values, flattened
///
/// Syntax: HGETALL key
pub struct HGetAllCommand;

impl Command for HGetAllCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let Some(hash) = args.item_ref(0)?.hash()? else {
            return Ok(RespValue::array(vec![]));
        };
        let flat = sorted_pairs(hash).into_iter().flat_map(|(f, v)| [f.clone(), v.clone()]);
        Ok(RespValue::bulk_array(flat))
    }

    fn signature(&self) -> Signature {
        Signature::new("hgetall", vec![Param::typed(ValueKind::Hash).or_reply(RespValue::array(vec![]))])
    }
}

/// HSCAN command - Incrementally iterate hash fields
///
/// Syntax: HSCAN key cursor [MATCH pattern] [COUNT count]
pub struct HScanCommand;

impl Command for HScanCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let options = ScanOptions::parse(&args.raw_all()[1..], false)?;
        let Some(hash) = args.item_ref(0)?.hash()? else {
            return Ok(scan_reply(0, Vec::new()));
        };

        let pairs = sorted_pairs(hash);
        let (next, window) = options.page(&pairs);
        let found = window
            .iter()
            .filter(|(field, _)| options.matches(field))
            .flat_map(|(f, v)| [(*f).clone(), (*v).clone()])
            .collect();
        Ok(scan_reply(next, found))
    }

    fn signature(&self) -> Signature {
        Signature::new("hscan", vec![Param::typed(ValueKind::Hash), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}
