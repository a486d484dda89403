//! Stream commands
//!
//! XADD, XLEN, XRANGE, XREVRANGE, XDEL, XTRIM and XREAD. Consumer group
//! commands live in `stream_group`. Streams are never removed when they
//! become empty.

use super::{is_keyword, parse_count, signature::parse_int, Args, Command, CommandContext, Flags, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::stream::{IdSpec, StreamEntry, StreamId, TrimStrategy};
use crate::store::ValueKind;
use bytes::Bytes;
use std::time::Duration;

/// `[id, [field, value, ...]]`; a deleted entry has a nil field list
pub(crate) fn entry_reply(id: StreamId, fields: Option<&[Bytes]>) -> RespValue {
    let fields = match fields {
        Some(fields) => RespValue::bulk_array(fields.iter().cloned()),
        None => RespValue::NullArray,
    };
    RespValue::array(vec![RespValue::bulk_string(id.to_bytes()), fields])
}

pub(crate) fn entries_reply<'a>(entries: impl IntoIterator<Item = &'a StreamEntry>) -> RespValue {
    RespValue::array(entries.into_iter().map(|e| entry_reply(e.id, Some(&e.fields))).collect())
}

/// Parse a complete `ms-seq` (or `ms`) id argument
pub(crate) fn parse_id(raw: &[u8]) -> Result<StreamId, CommandError> {
    StreamId::parse(raw).ok_or(CommandError::InvalidStreamId)
}

/// Lower bound of an interval: `-`, `(id` or `id` (missing sequence = 0)
pub(crate) fn parse_range_start(raw: &[u8]) -> Result<StreamId, CommandError> {
    if raw == b"-" {
        return Ok(StreamId::MIN);
    }
    if let Some(rest) = raw.strip_prefix(b"(") {
        let id = StreamId::parse_with_default(rest, 0).ok_or(CommandError::InvalidStreamId)?;
        return id
            .next()
            .ok_or_else(|| CommandError::custom("ERR", "invalid start ID for the interval"));
    }
    StreamId::parse_with_default(raw, 0).ok_or(CommandError::InvalidStreamId)
}

/// Upper bound of an interval: `+`, `(id` or `id` (missing sequence = max)
pub(crate) fn parse_range_end(raw: &[u8]) -> Result<StreamId, CommandError> {
    if raw == b"+" {
        return Ok(StreamId::MAX);
    }
    if let Some(rest) = raw.strip_prefix(b"(") {
        let id = StreamId::parse_with_default(rest, u64::MAX).ok_or(CommandError::InvalidStreamId)?;
        return id
            .prev()
            .ok_or_else(|| CommandError::custom("ERR", "invalid end ID for the interval"));
    }
    StreamId::parse_with_default(raw, u64::MAX).ok_or(CommandError::InvalidStreamId)
}

/// `BLOCK` milliseconds; zero waits forever
pub(crate) fn parse_block(raw: &[u8]) -> Result<Option<Duration>, CommandError> {
    let ms = parse_int(raw).map_err(|_| CommandError::TimeoutNotFloat)?;
    if ms < 0 {
        return Err(CommandError::TimeoutNegative);
    }
    Ok((ms > 0).then(|| Duration::from_millis(ms as u64)))
}

/// Split `key [key ...] id [id ...]` after STREAMS
pub(crate) fn split_streams<'a>(rest: &'a [Bytes], command: &str) -> Result<(&'a [Bytes], &'a [Bytes]), CommandError> {
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(CommandError::UnbalancedStreams(command.to_string()));
    }
    Ok(rest.split_at(rest.len() / 2))
}

/// MAXLEN / MINID clause
#[derive(Debug, Clone, Copy, PartialEq)]
struct Trim {
    strategy: TrimStrategy,
    limit: Option<usize>,
}

impl Trim {
    /// Parse a clause starting at `raw[i]`; returns the index after it
    fn parse(raw: &[Bytes], mut i: usize) -> Result<(Trim, usize), CommandError> {
        let by_len = is_keyword(&raw[i], "MAXLEN");
        i += 1;

        // `~` is accepted and trimming stays exact
        let mut approx = false;
        if let Some(op) = raw.get(i) {
            if op.as_ref() == b"~" {
                approx = true;
                i += 1;
            } else if op.as_ref() == b"=" {
                i += 1;
            }
        }

        let threshold = raw.get(i).ok_or(CommandError::Syntax)?;
        i += 1;
        let strategy = if by_len {
            let max = parse_int(threshold)?;
            if max < 0 {
                return Err(CommandError::custom("ERR", "The MAXLEN argument must be >= 0."));
            }
            TrimStrategy::MaxLen(max as usize)
        } else {
            TrimStrategy::MinId(parse_id(threshold)?)
        };

        let mut limit = None;
        if raw.get(i).is_some_and(|arg| is_keyword(arg, "LIMIT")) {
            let count = raw.get(i + 1).ok_or(CommandError::Syntax)?;
            if !approx {
                return Err(CommandError::custom(
                    "ERR",
                    "syntax error, LIMIT cannot be used without the special ~ option",
                ));
            }
            limit = Some(parse_count(count)?);
            i += 2;
        }

        Ok((Trim { strategy, limit }, i))
    }
}

fn is_trim_keyword(arg: &[u8]) -> bool {
    is_keyword(arg, "MAXLEN") || is_keyword(arg, "MINID")
}

/// XADD command - Append an entry to a stream
///
/// Syntax: XADD key [NOMKSTREAM] [MAXLEN|MINID [=|~] threshold [LIMIT count]] id|* field value [field value ...]
pub struct XAddCommand;

impl Command for XAddCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let mut no_create = false;
        let mut trim = None;
        let mut i = 1;
        while i < raw.len() {
            if is_keyword(&raw[i], "NOMKSTREAM") {
                no_create = true;
                i += 1;
            } else if is_trim_keyword(&raw[i]) {
                let (parsed, next) = Trim::parse(raw, i)?;
                trim = Some(parsed);
                i = next;
            } else {
                break;
            }
        }

        let spec = raw.get(i).ok_or(CommandError::Syntax)?;
        let fields: Vec<Bytes> = raw[i + 1..].to_vec();
        if fields.is_empty() || fields.len() % 2 != 0 {
            return Err(ctx.arity_error("xadd"));
        }
        let spec = IdSpec::parse(spec).ok_or(CommandError::InvalidStreamId)?;

        let now = ctx.now_ms();
        let item = args.item(0)?;
        if no_create && !item.exists() {
            return Ok(RespValue::Null);
        }
        let stream = item.stream_mut()?;
        let id = stream.add(fields, spec, now)?;
        if let Some(trim) = trim {
            stream.trim(trim.strategy, trim.limit);
        }
        Ok(RespValue::bulk_string(id.to_bytes()))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xadd",
            vec![Param::typed(ValueKind::Stream), Param::Bytes, Param::Bytes, Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
        .flags(Flags::LEAVE_EMPTY_VAL)
    }
}

/// XLEN command - Number of entries in a stream
///
/// Syntax: XLEN key
pub struct XLenCommand;

impl Command for XLenCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.stream()?.map_or(0, |s| s.len());
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("xlen", vec![Param::typed(ValueKind::Stream).or_reply(RespValue::integer(0))])
    }
}

fn range_generic(args: &Args, reverse: bool) -> CommandResult {
    let raw = args.raw_all();
    let (start, end) = if reverse {
        (parse_range_start(&raw[2])?, parse_range_end(&raw[1])?)
    } else {
        (parse_range_start(&raw[1])?, parse_range_end(&raw[2])?)
    };

    let count = match &raw[3..] {
        [] => None,
        [keyword, n] if is_keyword(keyword, "COUNT") => Some(parse_count(n)?),
        _ => return Err(CommandError::Syntax),
    };

    let Some(stream) = args.item_ref(0)?.stream()? else {
        return Ok(RespValue::array(vec![]));
    };
    Ok(entries_reply(stream.range(start, end, count, reverse)))
}

fn range_signature(name: &'static str) -> Signature {
    Signature::new(
        name,
        vec![
            Param::typed(ValueKind::Stream).or_reply(RespValue::array(vec![])),
            Param::Bytes,
            Param::Bytes,
        ],
    )
    .repeat(vec![Param::Bytes])
}

/// XRANGE command - Entries within an id interval, ascending
///
/// Syntax: XRANGE key start end [COUNT count]
pub struct XRangeCommand;

impl Command for XRangeCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        range_generic(args, false)
    }

    fn signature(&self) -> Signature {
        range_signature("xrange")
    }
}

/// XREVRANGE command - Entries within an id interval, descending
///
/// Syntax: XREVRANGE key end start [COUNT count]
pub struct XRevRangeCommand;

impl Command for XRevRangeCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        range_generic(args, true)
    }

    fn signature(&self) -> Signature {
        range_signature("xrevrange")
    }
}

/// XDEL command - Delete entries by id
///
/// Syntax: XDEL key id [id ...]
pub struct XDelCommand;

impl Command for XDelCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let ids = args.raw_all()[1..]
            .iter()
            .map(|raw| parse_id(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let removed = args.item(0)?.stream_mut()?.delete(&ids);
        Ok(RespValue::integer(removed as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xdel",
            vec![Param::typed(ValueKind::Stream).or_reply(RespValue::integer(0)), Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
        .flags(Flags::LEAVE_EMPTY_VAL)
    }
}

/// XTRIM command - Drop entries from the head of a stream
///
/// Syntax: XTRIM key MAXLEN|MINID [=|~] threshold [LIMIT count]
pub struct XTrimCommand;

impl Command for XTrimCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        if !is_trim_keyword(&raw[1]) {
            return Err(CommandError::Syntax);
        }
        let (trim, next) = Trim::parse(raw, 1)?;
        if next != raw.len() {
            return Err(CommandError::Syntax);
        }
        let removed = args.item(0)?.stream_mut()?.trim(trim.strategy, trim.limit);
        Ok(RespValue::integer(removed as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "xtrim",
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

/// XREAD options up to STREAMS
#[derive(Debug, Default)]
struct ReadOptions {
    count: Option<usize>,
    /// `Some(None)` blocks forever
    block: Option<Option<Duration>>,
    /// Index of the first key
    streams_at: usize,
}

impl ReadOptions {
    fn parse(raw: &[Bytes]) -> Result<Self, CommandError> {
        let mut options = ReadOptions::default();
        let mut i = 0;
        while i < raw.len() {
            let arg = &raw[i];
            if is_keyword(arg, "STREAMS") {
                options.streams_at = i + 1;
                return Ok(options);
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

fn read_streams(
    ctx: &mut CommandContext,
    targets: &[(Bytes, StreamId)],
    count: Option<usize>,
) -> Result<Option<RespValue>, CommandError> {
    let mut found = Vec::new();
    for (key, after) in targets {
        let item = ctx.resolve(key, Some(ValueKind::Stream))?;
        let Some(stream) = item.stream()? else {
            continue;
        };
        let entries = stream.read_after(*after, count);
        if !entries.is_empty() {
            found.push(RespValue::array(vec![
                RespValue::bulk_string(key.clone()),
                entries_reply(entries),
            ]));
        }
    }
    Ok((!found.is_empty()).then(|| RespValue::array(found)))
}

/// XREAD command - Read entries after the given ids, optionally blocking
///
/// Syntax: XREAD [COUNT count] [BLOCK milliseconds] STREAMS key [key ...] id [id ...]
pub struct XReadCommand;

impl Command for XReadCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let options = ReadOptions::parse(args.raw_all())?;
        let (keys, ids) = split_streams(&args.raw_all()[options.streams_at..], "xread")?;

        let mut targets = Vec::with_capacity(keys.len());
        for (key, id) in keys.iter().zip(ids) {
            let after = if id.as_ref() == b"$" {
                let item = ctx.resolve(key, Some(ValueKind::Stream))?;
                item.stream()?.map_or(StreamId::MIN, |s| s.last_id())
            } else {
                parse_id(id)?
            };
            targets.push((key.clone(), after));
        }

        let reply = match options.block {
            None => read_streams(ctx, &targets, options.count)?,
            Some(timeout) => ctx.block(timeout, |ctx, _first| read_streams(ctx, &targets, options.count))?,
        };
        Ok(reply.unwrap_or(RespValue::NullArray))
    }

    fn signature(&self) -> Signature {
        Signature::new("xread", vec![Param::Bytes, Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}
