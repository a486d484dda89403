//! Stream consumer group commands
//!
//! XGROUP, XREADGROUP, XACK, XPENDING, XCLAIM, XAUTOCLAIM and XINFO.

use super::stream::{entries_reply, entry_reply, parse_block, parse_id, parse_range_end, parse_range_start, split_streams};
use super::{is_keyword, parse_count, signature::parse_int, Args, Command, CommandContext, Flags, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::stream::{ClaimOptions, GroupStart, Stream, StreamEntry, StreamId};
use crate::store::ValueKind;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

fn no_group(key: &[u8], group: &[u8], context: &str) -> CommandError {
    CommandError::NoGroup {
        key: String::from_utf8_lossy(key).into_owned(),
        group: String::from_utf8_lossy(group).into_owned(),
        context: context.to_string(),
    }
}

fn id_reply(id: StreamId) -> RespValue {
    RespValue::bulk_string(id.to_bytes())
}

fn ids_reply(ids: impl IntoIterator<Item = StreamId>) -> RespValue {
    RespValue::array(ids.into_iter().map(id_reply).collect())
}

fn optional_int(value: Option<u64>) -> RespValue {
    value.map_or(RespValue::Null, |v| RespValue::integer(v as i64))
}

/// Group position given to CREATE / SETID; `$` is the stream's last id
fn parse_group_id(raw: &[u8], stream: Option<&Stream>) -> Result<StreamId, CommandError> {
    if raw == b"$" {
        return Ok(stream.map_or(StreamId::MIN, Stream::last_id));
    }
    parse_id(raw)
}

/// `ENTRIESREAD n` suffix
fn parse_entries_read(rest: &[Bytes]) -> Result<Option<u64>, CommandError> {
    match rest {
        [] => Ok(None),
        [keyword, n] if is_keyword(keyword, "ENTRIESREAD") => {
            let n = parse_int(n)?;
            if n < 0 {
                return Err(CommandError::custom("ERR", "value for ENTRIESREAD must be positive or -1"));
            }
            Ok(Some(n as u64))
        }
        _ => Err(CommandError::Syntax),
    }
}

/// Entries-read counter for a group positioned at `id` when none was given
fn default_entries_read(stream: &Stream, id: StreamId) -> Option<u64> {
    if id >= stream.last_id() {
        Some(stream.entries_added())
    } else if id == StreamId::MIN && stream.max_deleted_id() == StreamId::MIN {
        Some(0)
    } else {
        None
    }
}

/// XGROUP command - Manage consumer groups
///
/// Syntax: XGROUP CREATE key group id|$ [MKSTREAM] [ENTRIESREAD n]
///         XGROUP DESTROY key group
///         XGROUP CREATECONSUMER key group consumer
///         XGROUP DELCONSUMER key group consumer
///         XGROUP SETID key group id|$ [ENTRIESREAD n]
pub struct XGroupCommand;

impl XGroupCommand {
    fn create(ctx: &mut CommandContext, raw: &[Bytes]) -> CommandResult {
        let [key, group, id, rest @ ..] = raw else {
            return Err(ctx.arity_error("xgroup|create"));
        };
        let mut mkstream = false;
        let mut rest = rest;
        if let [first, tail @ ..] = rest {
            if is_keyword(first, "MKSTREAM") {
                mkstream = true;
                rest = tail;
            }
        }
        let entries_read = parse_entries_read(rest)?;

        let mut item = ctx.resolve(key, Some(ValueKind::Stream))?;
        if !item.exists() && !mkstream {
            return Err(CommandError::XGroupKeyMissing);
        }
        let stream = item.stream_mut()?;
        let start = parse_group_id(id, Some(&*stream))?;
        let entries_read = entries_read.or_else(|| default_entries_read(stream, start));
        stream.create_group(group.clone(), start, entries_read)?;
        ctx.write_back(item, false);

        debug!("Created group {} at {}", String::from_utf8_lossy(group), start);
        Ok(RespValue::ok())
    }

    fn setid(ctx: &mut CommandContext, raw: &[Bytes]) -> CommandResult {
        let [key, group, id, rest @ ..] = raw else {
            return Err(ctx.arity_error("xgroup|setid"));
        };
        let entries_read = parse_entries_read(rest)?;

        let mut item = ctx.resolve(key, Some(ValueKind::Stream))?;
        if !item.exists() {
            return Err(CommandError::XGroupKeyMissing);
        }
        let stream = item.stream_mut()?;
        let start = parse_group_id(id, Some(&*stream))?;
        let entries_read = entries_read.or_else(|| default_entries_read(stream, start));
        let target = stream.group_mut(group).ok_or_else(|| no_group(key, group, ""))?;
        target.last_delivered = start;
        target.entries_read = entries_read;
        ctx.write_back(item, false);
        Ok(RespValue::ok())
    }

    /// DESTROY, CREATECONSUMER and DELCONSUMER
    fn membership(ctx: &mut CommandContext, sub: &str, raw: &[Bytes]) -> CommandResult {
        let (key, group, consumer) = match (sub, raw) {
            ("destroy", [key, group]) => (key, group, None),
            ("createconsumer" | "delconsumer", [key, group, consumer]) => (key, group, Some(consumer)),
            _ => return Err(ctx.arity_error(&format!("xgroup|{}", sub))),
        };

        let now = ctx.now_ms();
        let mut item = ctx.resolve(key, Some(ValueKind::Stream))?;
        if !item.exists() {
            return Err(CommandError::XGroupKeyMissing);
        }
        let stream = item.stream_mut()?;

        let reply = match (sub, consumer) {
            ("destroy", _) => stream.destroy_group(group) as i64,
            ("createconsumer", Some(consumer)) => {
                let target = stream.group_mut(group).ok_or_else(|| no_group(key, group, ""))?;
                target.create_consumer(consumer.clone(), now) as i64
            }
            (_, Some(consumer)) => {
                let target = stream.group_mut(group).ok_or_else(|| no_group(key, group, ""))?;
                target.delete_consumer(consumer) as i64
            }
            _ => 0,
        };
        ctx.write_back(item, false);
        Ok(RespValue::integer(reply))
    }
}

impl Command for XGroupCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let sub = String::from_utf8_lossy(&raw[0]).to_lowercase();
        let rest = &raw[1..];
        match sub.as_str() {
            "create" => Self::create(ctx, rest),
            "setid" => Self::setid(ctx, rest),
            "destroy" | "createconsumer" | "delconsumer" => Self::membership(ctx, &sub, rest),
            _ => Err(CommandError::UnknownSubcommand {
                command: "XGROUP".to_string(),
                subcommand: String::from_utf8_lossy(&raw[0]).into_owned(),
            }),
        }
    }

    fn signature(&self) -> Signature {
        Signature::new("xgroup", vec![Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// XREADGROUP options between the consumer and STREAMS
#[derive(Debug, Default)]
struct GroupReadOptions {
    count: Option<usize>,
    block: Option<Option<Duration>>,
    noack: bool,
    streams_at: usize,
}

impl GroupReadOptions {
    fn parse(raw: &[Bytes], from: usize) -> Result<Self, CommandError> {
        let mut options = GroupReadOptions::default();
        let mut i = from;
        while i < raw.len() {
            let arg = &raw[i];
            if is_keyword(arg, "STREAMS") {
                options.streams_at = i + 1;
                return Ok(options);
            }
            if is_keyword(arg, "NOACK") {
                options.noack = true;
                i += 1;
                continue;
            }
            let value = raw.get(i + 1).ok_or(CommandError::Syntax)?;
            if is_keyword(arg, "COUNT") {
                options.count = Some(parse_count(value)?);
            } else if is_keyword(arg, "BLOCK") {
                options.block = Some(parse_block(value)?);
            } else {
                return Err(CommandError::Syntax);
            }
            i += 2;
        }
        Err(CommandError::Syntax)
    }
}

const READGROUP_CONTEXT: &str = " in XREADGROUP with GROUP option";

struct GroupRead<'r> {
    group: &'r Bytes,
    consumer: &'r Bytes,
    targets: Vec<(Bytes, GroupStart)>,
    count: Option<usize>,
    noack: bool,
}

impl GroupRead<'_> {
    /// One pass over every stream
    ///
    /// Retries only touch a stream when it has something to deliver, so
    /// waiting readers do not wake each other.
    fn attempt(&self, ctx: &mut CommandContext, first: bool) -> Result<Option<RespValue>, CommandError> {
        let now = ctx.now_ms();
        let mut found = Vec::new();
        let mut replay = false;

        for (key, start) in &self.targets {
            let mut item = ctx.resolve(key, Some(ValueKind::Stream))?;
            let (pending, known) = {
                let stream = item.stream()?.ok_or_else(|| no_group(key, self.group, READGROUP_CONTEXT))?;
                let group = stream
                    .group(self.group)
                    .ok_or_else(|| no_group(key, self.group, READGROUP_CONTEXT))?;
                let pending = match start {
                    GroupStart::New => !stream.read_after(group.last_delivered, Some(1)).is_empty(),
                    GroupStart::Pending(_) => group.pending_for(self.consumer) > 0,
                };
                let known = group.consumers().any(|c| c.name == *self.consumer);
                (pending, known)
            };

            // nothing to deliver and no consumer to create: leave the stream untouched
            if !pending && (known || !first) {
                if matches!(start, GroupStart::Pending(_)) {
                    replay = true;
                    found.push(RespValue::array(vec![
                        RespValue::bulk_string(key.clone()),
                        RespValue::array(vec![]),
                    ]));
                }
                continue;
            }

            let delivered = item
                .stream_mut()?
                .group_read(self.group, self.consumer, *start, self.count, self.noack, now)
                .ok_or_else(|| no_group(key, self.group, READGROUP_CONTEXT))?;
            ctx.write_back(item, false);

            if matches!(start, GroupStart::Pending(_)) {
                replay = true;
            } else if delivered.is_empty() {
                continue;
            }
            let entries = delivered
                .iter()
                .map(|(id, fields)| entry_reply(*id, fields.as_deref()))
                .collect();
            found.push(RespValue::array(vec![
                RespValue::bulk_string(key.clone()),
                RespValue::array(entries),
            ]));
        }

        Ok((replay || !found.is_empty()).then(|| RespValue::array(found)))
    }
}

/// XREADGROUP command - Read entries on behalf of a group consumer
///
/// Syntax: XREADGROUP GROUP group consumer [COUNT count] [BLOCK ms] [NOACK] STREAMS key [key ...] id|> [id|> ...]
pub struct XReadGroupCommand;

impl Command for XReadGroupCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        if !is_keyword(&raw[0], "GROUP") {
            return Err(CommandError::Syntax);
        }
        let (group, consumer) = (&raw[1], &raw[2]);
        let options = GroupReadOptions::parse(raw, 3)?;
        let (keys, ids) = split_streams(&raw[options.streams_at..], "xreadgroup")?;

        let mut targets = Vec::with_capacity(keys.len());
        for (key, id) in keys.iter().zip(ids) {
            let start = if id.as_ref() == b">" {
                GroupStart::New
            } else {
                GroupStart::Pending(parse_id(id)?)
            };
            targets.push((key.clone(), start));
        }

        let read = GroupRead {
            group,
            consumer,
            targets,
            count: options.count,
            noack: options.noack,
        };
        let reply = match options.block {
            None => read.attempt(ctx, true)?,
            Some(timeout) => ctx.block(timeout, |ctx, first| read.attempt(ctx, first))?,
        };
        Ok(reply.unwrap_or(RespValue::NullArray))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xreadgroup",
            vec![Param::Bytes, Param::Bytes, Param::Bytes, Param::Bytes, Param::Bytes, Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
    }
}

/// XACK command - Acknowledge delivered entries
///
/// Syntax: XACK key group id [id ...]
pub struct XAckCommand;

impl Command for XAckCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let group = args.raw(1).clone();
        let ids = args.raw_all()[2..]
            .iter()
            .map(|raw| parse_id(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let item = args.item(0)?;
        let known = item.stream()?.is_some_and(|s| s.group(&group).is_some());
        if !known {
            return Ok(RespValue::integer(0));
        }
        let acked = item.stream_mut()?.group_mut(&group).map_or(0, |g| g.ack(&ids));
        Ok(RespValue::integer(acked as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xack",
            vec![
                Param::typed(ValueKind::Stream).or_reply(RespValue::integer(0)),
                Param::Bytes,
                Param::Bytes,
            ],
        )
        .repeat(vec![Param::Bytes])
        .flags(Flags::LEAVE_EMPTY_VAL)
    }
}

/// XPENDING command - Inspect a group's pending entries
///
/// Syntax: XPENDING key group [[IDLE min-idle] start end count [consumer]]
pub struct XPendingCommand;

impl Command for XPendingCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (key, group_name) = (&raw[0], &raw[1]);

        let mut rest = &raw[2..];
        let mut min_idle = 0;
        if let [keyword, idle, tail @ ..] = rest {
            if is_keyword(keyword, "IDLE") {
                min_idle = parse_int(idle)?.max(0) as u64;
                rest = tail;
                if rest.is_empty() {
                    return Err(CommandError::Syntax);
                }
            }
        }
        let extended = match rest {
            [] => None,
            [start, end, count] => Some((start, end, count, None)),
            [start, end, count, consumer] => Some((start, end, count, Some(consumer))),
            _ => return Err(CommandError::Syntax),
        };

        let now = ctx.now_ms();
        let stream = args.item_ref(0)?.stream()?.ok_or_else(|| no_group(key, group_name, ""))?;
        let group = stream.group(group_name).ok_or_else(|| no_group(key, group_name, ""))?;

        let Some((start, end, count, consumer)) = extended else {
            let summary = group.pending_summary();
            if summary.count == 0 {
                return Ok(RespValue::array(vec![
                    RespValue::integer(0),
                    RespValue::Null,
                    RespValue::Null,
                    RespValue::NullArray,
                ]));
            }
            let consumers = summary
                .per_consumer
                .into_iter()
                .map(|(name, n)| RespValue::bulk_array([name, Bytes::from(n.to_string())]))
                .collect();
            return Ok(RespValue::array(vec![
                RespValue::integer(summary.count as i64),
                summary.smallest.map_or(RespValue::Null, id_reply),
                summary.largest.map_or(RespValue::Null, id_reply),
                RespValue::array(consumers),
            ]));
        };

        let (start, end) = (parse_range_start(start)?, parse_range_end(end)?);
        let count = parse_int(count)?.max(0) as usize;
        let rows = group
            .pending_range(start, end, count, consumer.map(|c| &c[..]), min_idle, now)
            .into_iter()
            .map(|(id, owner, idle, deliveries)| {
                RespValue::array(vec![
                    id_reply(id),
                    RespValue::bulk_string(owner),
                    RespValue::integer(idle as i64),
                    RespValue::integer(deliveries as i64),
                ])
            })
            .collect();
        Ok(RespValue::array(rows))
    }

    fn signature(&self) -> Signature {
        Signature::new("xpending", vec![Param::typed(ValueKind::Stream), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

fn claimed_reply(claimed: &[StreamEntry], just_id: bool) -> RespValue {
    if just_id {
        ids_reply(claimed.iter().map(|e| e.id))
    } else {
        entries_reply(claimed)
    }
}

/// XCLAIM command - Take over pending entries from other consumers
///
/// Syntax: XCLAIM key group consumer min-idle-time id [id ...] [IDLE ms] [TIME unix-ms] [RETRYCOUNT count] [FORCE] [JUSTID] [LASTID id]
pub struct XClaimCommand;

impl Command for XClaimCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (key, group, consumer) = (raw[0].clone(), raw[1].clone(), raw[2].clone());
        let mut opts = ClaimOptions {
            min_idle_ms: parse_int(&raw[3])?.max(0) as u64,
            ..ClaimOptions::default()
        };

        let mut i = 4;
        let mut ids = Vec::new();
        while i < raw.len() {
            match StreamId::parse(&raw[i]) {
                Some(id) => ids.push(id),
                None => break,
            }
            i += 1;
        }
        if ids.is_empty() {
            return Err(CommandError::InvalidStreamId);
        }

        while i < raw.len() {
            let arg = &raw[i];
            if is_keyword(arg, "FORCE") {
                opts.force = true;
            } else if is_keyword(arg, "JUSTID") {
                opts.just_id = true;
            } else {
                let value = raw.get(i + 1).ok_or(CommandError::Syntax)?;
                if is_keyword(arg, "IDLE") {
                    opts.idle_ms = Some(parse_int(value)?.max(0) as u64);
                } else if is_keyword(arg, "TIME") {
                    opts.time_ms = Some(parse_int(value)?.max(0) as u64);
                } else if is_keyword(arg, "RETRYCOUNT") {
                    opts.retry_count = Some(parse_int(value)?.max(0) as u64);
                } else if is_keyword(arg, "LASTID") {
                    parse_id(value)?;
                } else {
                    return Err(CommandError::custom(
                        "ERR",
                        format!("Unrecognized XCLAIM option '{}'", String::from_utf8_lossy(arg)),
                    ));
                }
                i += 1;
            }
            i += 1;
        }

        let now = ctx.now_ms();
        let item = args.item(0)?;
        if !item.stream()?.is_some_and(|s| s.group(&group).is_some()) {
            return Err(no_group(&key, &group, ""));
        }
        let claimed = item
            .stream_mut()?
            .claim(&group, &consumer, &ids, &opts, now)
            .ok_or_else(|| no_group(&key, &group, ""))?;
        Ok(claimed_reply(&claimed, opts.just_id))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xclaim",
            vec![Param::typed(ValueKind::Stream), Param::Bytes, Param::Bytes, Param::Bytes, Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
        .flags(Flags::LEAVE_EMPTY_VAL)
    }
}

/// XAUTOCLAIM command - Claim idle pending entries by scanning the PEL
///
/// Syntax: XAUTOCLAIM key group consumer min-idle-time start [COUNT count] [JUSTID]
pub struct XAutoClaimCommand;

impl Command for XAutoClaimCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (key, group, consumer) = (raw[0].clone(), raw[1].clone(), raw[2].clone());
        let min_idle = parse_int(&raw[3])?.max(0) as u64;
        let start = parse_range_start(&raw[4])?;

        let mut count = 100;
        let mut just_id = false;
        let mut i = 5;
        while i < raw.len() {
            if is_keyword(&raw[i], "JUSTID") {
                just_id = true;
            } else if is_keyword(&raw[i], "COUNT") {
                let value = raw.get(i + 1).ok_or(CommandError::Syntax)?;
                count = parse_count(value)?;
                if count == 0 {
                    return Err(CommandError::custom("ERR", "COUNT must be > 0"));
                }
                i += 1;
            } else {
                return Err(CommandError::Syntax);
            }
            i += 1;
        }

        let now = ctx.now_ms();
        let item = args.item(0)?;
        if !item.stream()?.is_some_and(|s| s.group(&group).is_some()) {
            return Err(no_group(&key, &group, ""));
        }
        let result = item
            .stream_mut()?
            .autoclaim(&group, &consumer, min_idle, start, count, just_id, now)
            .ok_or_else(|| no_group(&key, &group, ""))?;

        Ok(RespValue::array(vec![
            id_reply(result.next),
            claimed_reply(&result.claimed, just_id),
            ids_reply(result.deleted),
        ]))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xautoclaim",
            vec![Param::typed(ValueKind::Stream), Param::Bytes, Param::Bytes, Param::Bytes, Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
        .flags(Flags::LEAVE_EMPTY_VAL)
    }
}

/// Flat `[name, value, ...]` reply
fn fields_reply(pairs: Vec<(&str, RespValue)>) -> RespValue {
    let mut out = Vec::with_capacity(pairs.len() * 2);
    for (name, value) in pairs {
        out.push(RespValue::bulk_string(name.to_string()));
        out.push(value);
    }
    RespValue::array(out)
}

/// XINFO command - Introspect streams, groups and consumers
///
/// Syntax: XINFO STREAM key | XINFO GROUPS key | XINFO CONSUMERS key group
pub struct XInfoCommand;

impl XInfoCommand {
    fn stream_info(stream: &Stream, modern: bool) -> RespValue {
        let edge = |entry: Option<&StreamEntry>| entry.map_or(RespValue::Null, |e| entry_reply(e.id, Some(&e.fields)));
        let mut pairs = vec![
            ("length", RespValue::integer(stream.len() as i64)),
            ("last-generated-id", id_reply(stream.last_id())),
        ];
        if modern {
            pairs.push(("max-deleted-entry-id", id_reply(stream.max_deleted_id())));
            pairs.push(("entries-added", RespValue::integer(stream.entries_added() as i64)));
        }
        pairs.push(("groups", RespValue::integer(stream.groups().count() as i64)));
        pairs.push(("first-entry", edge(stream.first_entry())));
        pairs.push(("last-entry", edge(stream.last_entry())));
        fields_reply(pairs)
    }

    fn groups_info(stream: &Stream, modern: bool) -> RespValue {
        let groups = stream
            .groups()
            .map(|group| {
                let mut pairs = vec![
                    ("name", RespValue::bulk_string(group.name.clone())),
                    ("consumers", RespValue::integer(group.consumers().count() as i64)),
                    ("pending", RespValue::integer(group.pending_len() as i64)),
                    ("last-delivered-id", id_reply(group.last_delivered)),
                ];
                if modern {
                    pairs.push(("entries-read", optional_int(group.entries_read)));
                    pairs.push(("lag", optional_int(stream.lag(group))));
                }
                fields_reply(pairs)
            })
            .collect();
        RespValue::array(groups)
    }

    fn consumers_info(stream: &Stream, key: &[u8], group_name: &[u8], now: u64, modern: bool) -> CommandResult {
        let group = stream.group(group_name).ok_or_else(|| no_group(key, group_name, ""))?;
        let consumers = group
            .consumers()
            .map(|consumer| {
                let mut pairs = vec![
                    ("name", RespValue::bulk_string(consumer.name.clone())),
                    ("pending", RespValue::integer(group.pending_for(&consumer.name) as i64)),
                    ("idle", RespValue::integer(now.saturating_sub(consumer.seen_time) as i64)),
                ];
                if modern {
                    let inactive = consumer.active_time.map_or(-1, |t| now.saturating_sub(t) as i64);
                    pairs.push(("inactive", RespValue::integer(inactive)));
                }
                fields_reply(pairs)
            })
            .collect();
        Ok(RespValue::array(consumers))
    }
}

impl Command for XInfoCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let sub = String::from_utf8_lossy(&raw[0]).to_lowercase();
        let expected = match sub.as_str() {
            "stream" | "groups" => 2,
            "consumers" => 3,
            _ => {
                return Err(CommandError::UnknownSubcommand {
                    command: "XINFO".to_string(),
                    subcommand: String::from_utf8_lossy(&raw[0]).into_owned(),
                })
            }
        };
        if raw.len() != expected {
            return Err(ctx.arity_error(&format!("xinfo|{}", sub)));
        }

        let modern = ctx.config().version >= 7;
        let now = ctx.now_ms();
        let item = ctx.resolve(&raw[1], Some(ValueKind::Stream))?;
        let stream = item.stream()?.ok_or(CommandError::NoSuchKey)?;
        match sub.as_str() {
            "stream" => Ok(Self::stream_info(stream, modern)),
            "groups" => Ok(Self::groups_info(stream, modern)),
            _ => Self::consumers_info(stream, &raw[1], &raw[2], now, modern),
        }
    }

    fn signature(&self) -> Signature {
        Signature::new("xinfo", vec![Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}
