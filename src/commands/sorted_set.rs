//! Sorted set commands
//!
//! ZADD, ZREM, ZSCORE, ZCARD, ZINCRBY, ZRANK, ZREVRANK, ZCOUNT, ZLEXCOUNT,
//! the ZRANGE family, ZPOPMIN/ZPOPMAX with their blocking variants and ZSCAN.

use super::search::{scan_reply, ScanOptions};
use super::{
    clamp_range, is_keyword, parse_count, signature::parse_int, signature::parse_timeout, Args, Command,
    CommandContext, Param, Signature,
};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::zset::{parse_float, LexBound, ScoreBound};
use crate::store::{SortedSet, ValueKind};
use bytes::Bytes;

fn empty_array() -> RespValue {
    RespValue::array(vec![])
}

/// Flatten (member, score) pairs, with or without the scores
fn entries_reply<'a>(entries: impl IntoIterator<Item = (&'a Bytes, f64)>, with_scores: bool) -> RespValue {
    let mut out = Vec::new();
    for (member, score) in entries {
        out.push(RespValue::bulk_string(member.clone()));
        if with_scores {
            out.push(RespValue::double(score));
        }
    }
    RespValue::array(out)
}

/// ZADD flags
#[derive(Debug, Default)]
struct ZAddOptions {
    nx: bool,
    xx: bool,
    gt: bool,
    lt: bool,
    ch: bool,
    incr: bool,
}

impl ZAddOptions {
    /// Parse leading flags; returns the options and the index of the first score
    fn parse(raw: &[Bytes]) -> Result<(Self, usize), CommandError> {
        let mut options = ZAddOptions::default();
        let mut i = 1;
        while i < raw.len() {
            let arg = &raw[i];
            if is_keyword(arg, "NX") {
                options.nx = true;
            } else if is_keyword(arg, "XX") {
                options.xx = true;
            } else if is_keyword(arg, "GT") {
                options.gt = true;
            } else if is_keyword(arg, "LT") {
                options.lt = true;
            } else if is_keyword(arg, "CH") {
                options.ch = true;
            } else if is_keyword(arg, "INCR") {
                options.incr = true;
            } else {
                break;
            }
            i += 1;
        }

        if options.nx && options.xx {
            return Err(CommandError::custom("ERR", "XX and NX options at the same time are not compatible"));
        }
        if (options.gt && options.lt) || (options.nx && (options.gt || options.lt)) {
            return Err(CommandError::custom(
                "ERR",
                "GT, LT, and/or NX options at the same time are not compatible",
            ));
        }
        Ok((options, i))
    }
}

/// ZADD command - Add members with scores, or update their scores
///
/// Syntax: ZADD key [NX|XX] [GT|LT] [CH] [INCR] score member [score member ...]
pub struct ZAddCommand;

impl Command for ZAddCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let (options, first) = ZAddOptions::parse(args.raw_all())?;
        let rest = &args.raw_all()[first..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::Syntax);
        }
        if options.incr && rest.len() > 2 {
            return Err(CommandError::custom("ERR", "INCR option supports a single increment-element pair"));
        }

        let mut pairs = Vec::with_capacity(rest.len() / 2);
        for pair in rest.chunks_exact(2) {
            let score = parse_float(&pair[0]).ok_or(CommandError::NotFloat)?;
            pairs.push((score, pair[1].clone()));
        }

        let zset = args.item(0)?.zset_mut()?;
        let (mut added, mut changed) = (0, 0);
        let mut incr_result = None;
        for (score, member) in pairs {
            let current = zset.score(&member);
            if (options.nx && current.is_some()) || (options.xx && current.is_none()) {
                continue;
            }

            let new = if options.incr {
                let sum = current.unwrap_or(0.0) + score;
                if sum.is_nan() {
                    return Err(CommandError::NanOrInfinity);
                }
                sum
            } else {
                score
            };

            if let Some(old) = current {
                if (options.gt && new <= old) || (options.lt && new >= old) {
                    continue;
                }
            }

            if zset.insert(member, new) {
                if current.is_none() {
                    added += 1;
                } else {
                    changed += 1;
                }
            }
            incr_result = Some(new);
        }

        if options.incr {
            return Ok(incr_result.map_or(RespValue::Null, RespValue::double));
        }
        Ok(RespValue::integer(if options.ch { added + changed } else { added }))
    }

    fn signature(&self) -> Signature {
        Signature::new("zadd", vec![Param::typed(ValueKind::SortedSet), Param::Bytes, Param::Bytes])
            .repeat(vec![Param::Bytes])
    }
}

/// ZREM command - Remove members
///
/// Syntax: ZREM key member [member ...]
pub struct ZRemCommand;

impl Command for ZRemCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let members: Vec<Bytes> = args.raw_all()[1..].to_vec();
        let zset = args.item(0)?.zset_mut()?;
        let removed = members.iter().filter(|m| zset.remove(m)).count();
        Ok(RespValue::integer(removed as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "zrem",
            vec![Param::typed(ValueKind::SortedSet).or_reply(RespValue::integer(0)), Param::Bytes],
        )
        .repeat(vec![Param::Bytes])
    }
}

/// ZSCORE command - Score of a member
///
/// Syntax: ZSCORE key member
pub struct ZScoreCommand;

impl Command for ZScoreCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let score = args.item_ref(0)?.zset()?.and_then(|z| z.score(args.raw(1)));
        Ok(score.map_or(RespValue::Null, RespValue::double))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "zscore",
            vec![Param::typed(ValueKind::SortedSet).or_reply(RespValue::Null), Param::Bytes],
        )
    }
}

/// ZCARD command - Number of members
///
/// Syntax: ZCARD key
pub struct ZCardCommand;

impl Command for ZCardCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let len = args.item_ref(0)?.zset()?.map_or(0, SortedSet::len);
        Ok(RespValue::integer(len as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("zcard", vec![Param::typed(ValueKind::SortedSet).or_reply(RespValue::integer(0))])
    }
}

/// ZINCRBY command - Increment the score of a member
///
/// Syntax: ZINCRBY key increment member
pub struct ZIncrByCommand;

impl Command for ZIncrByCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let increment = args.float(1)?;
        let member = args.raw(2).clone();
        let zset = args.item(0)?.zset_mut()?;
        let score = zset.score(&member).unwrap_or(0.0) + increment;
        if score.is_nan() {
            return Err(CommandError::NanOrInfinity);
        }
        zset.insert(member, score);
        Ok(RespValue::double(score))
    }

    fn signature(&self) -> Signature {
        Signature::new("zincrby", vec![Param::typed(ValueKind::SortedSet), Param::Float, Param::Bytes])
    }
}

fn rank_generic(ctx: &CommandContext, args: &Args, reverse: bool, name: &str) -> CommandResult {
    let with_score = match args.len() {
        2 => false,
        3 if is_keyword(args.raw(2), "WITHSCORE") => true,
        3 => return Err(CommandError::Syntax),
        _ => return Err(ctx.arity_error(name)),
    };

    let Some(zset) = args.item_ref(0)?.zset()? else {
        return Ok(RespValue::Null);
    };
    let member = args.raw(1);
    let rank = if reverse { zset.rev_rank(member) } else { zset.rank(member) };
    Ok(match (rank, zset.score(member)) {
        (Some(rank), Some(score)) if with_score => {
            RespValue::array(vec![RespValue::integer(rank as i64), RespValue::double(score)])
        }
        (Some(rank), _) => RespValue::integer(rank as i64),
        (None, _) => RespValue::Null,
    })
}

/// ZRANK command - Ascending rank of a member
///
/// Syntax: ZRANK key member [WITHSCORE]
pub struct ZRankCommand;

impl Command for ZRankCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        rank_generic(ctx, args, false, "zrank")
    }

    fn signature(&self) -> Signature {
        Signature::new("zrank", vec![Param::typed(ValueKind::SortedSet), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// ZREVRANK command - Descending rank of a member
///
/// Syntax: ZREVRANK key member [WITHSCORE]
pub struct ZRevRankCommand;

impl Command for ZRevRankCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        rank_generic(ctx, args, true, "zrevrank")
    }

    fn signature(&self) -> Signature {
        Signature::new("zrevrank", vec![Param::typed(ValueKind::SortedSet), Param::Bytes])
            .repeat(vec![Param::Bytes])
    }
}

/// ZCOUNT command - Number of members within a score range
///
/// Syntax: ZCOUNT key min max
pub struct ZCountCommand;

impl Command for ZCountCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let (min, max) = (args.score(1)?, args.score(2)?);
        let count = args.item_ref(0)?.zset()?.map_or(0, |z| z.count_by_score(&min, &max));
        Ok(RespValue::integer(count as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "zcount",
            vec![
                Param::typed(ValueKind::SortedSet).or_reply(RespValue::integer(0)),
                Param::Score,
                Param::Score,
            ],
        )
    }
}

/// ZLEXCOUNT command - Number of members within a lexicographic range
///
/// Syntax: ZLEXCOUNT key min max
pub struct ZLexCountCommand;

impl Command for ZLexCountCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let (min, max) = (args.lex(1)?, args.lex(2)?);
        let count = args.item_ref(0)?.zset()?.map_or(0, |z| z.count_by_lex(&min, &max));
        Ok(RespValue::integer(count as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "zlexcount",
            vec![
                Param::typed(ValueKind::SortedSet).or_reply(RespValue::integer(0)),
                Param::Lex,
                Param::Lex,
            ],
        )
    }
}

/// What a range query selects by
#[derive(Debug, Clone)]
enum RangeBy {
    Rank(i64, i64),
    Score(ScoreBound, ScoreBound),
    Lex(LexBound, LexBound),
}

/// A parsed ZRANGE-family query
#[derive(Debug, Clone)]
struct RangeQuery {
    by: RangeBy,
    reverse: bool,
    /// (offset, count); a negative count means "all"
    limit: Option<(i64, i64)>,
    with_scores: bool,
}

impl RangeQuery {
    /// Parse trailing `WITHSCORES` / `LIMIT offset count` options
    fn parse_options(&mut self, raw: &[Bytes], allow_rank_limit: bool) -> Result<(), CommandError> {
        let mut i = 0;
        while i < raw.len() {
            if is_keyword(&raw[i], "WITHSCORES") {
                self.with_scores = true;
            } else if is_keyword(&raw[i], "LIMIT") {
                let (offset, count) = match (raw.get(i + 1), raw.get(i + 2)) {
                    (Some(o), Some(c)) => (parse_int(o)?, parse_int(c)?),
                    _ => return Err(CommandError::Syntax),
                };
                self.limit = Some((offset, count));
                i += 2;
            } else if is_keyword(&raw[i], "REV") {
                self.reverse = true;
            } else {
                return Err(CommandError::Syntax);
            }
            i += 1;
        }

        if self.limit.is_some() && !allow_rank_limit && matches!(self.by, RangeBy::Rank(..)) {
            return Err(CommandError::custom(
                "ERR",
                "syntax error, LIMIT is only supported in combination with either BYSCORE or BYLEX",
            ));
        }
        if self.with_scores && matches!(self.by, RangeBy::Lex(..)) {
            return Err(CommandError::custom(
                "ERR",
                "syntax error, WITHSCORES not supported in combination with BYLEX",
            ));
        }
        Ok(())
    }

    fn run(&self, zset: &SortedSet) -> RespValue {
        let selected: Vec<(&Bytes, f64)> = match &self.by {
            RangeBy::Rank(start, stop) => match clamp_range(*start, *stop, zset.len()) {
                None => Vec::new(),
                Some((from, to)) if self.reverse => {
                    let last = zset.len() - 1;
                    zset.range_by_rank(last - to, last - from)
                        .iter()
                        .rev()
                        .map(|(s, m)| (m, *s))
                        .collect()
                }
                Some((from, to)) => zset.range_by_rank(from, to).iter().map(|(s, m)| (m, *s)).collect(),
            },
            RangeBy::Score(min, max) => ordered(zset.range_by_score(min, max), self.reverse),
            RangeBy::Lex(min, max) => ordered(zset.range_by_lex(min, max), self.reverse),
        };

        let limited: Vec<(&Bytes, f64)> = match self.limit {
            None => selected,
            Some((offset, _)) if offset < 0 => Vec::new(),
            Some((offset, count)) => {
                let iter = selected.into_iter().skip(offset as usize);
                if count < 0 { iter.collect() } else { iter.take(count as usize).collect() }
            }
        };
        entries_reply(limited, self.with_scores)
    }
}

fn ordered(slice: &[(f64, Bytes)], reverse: bool) -> Vec<(&Bytes, f64)> {
    let iter = slice.iter().map(|(s, m)| (m, *s));
    if reverse { iter.rev().collect() } else { iter.collect() }
}

fn parse_score_pair(lo: &[u8], hi: &[u8]) -> Result<(ScoreBound, ScoreBound), CommandError> {
    let lo = ScoreBound::parse(lo).ok_or(CommandError::InvalidScoreRange)?;
    let hi = ScoreBound::parse(hi).ok_or(CommandError::InvalidScoreRange)?;
    Ok((lo, hi))
}

fn parse_lex_pair(lo: &[u8], hi: &[u8]) -> Result<(LexBound, LexBound), CommandError> {
    let lo = LexBound::parse(lo).ok_or(CommandError::InvalidLexRange)?;
    let hi = LexBound::parse(hi).ok_or(CommandError::InvalidLexRange)?;
    Ok((lo, hi))
}

fn range_signature(name: &'static str) -> Signature {
    Signature::new(
        name,
        vec![
            Param::typed(ValueKind::SortedSet).or_reply(empty_array()),
            Param::Bytes,
            Param::Bytes,
        ],
    )
    .repeat(vec![Param::Bytes])
}

fn run_query(args: &Args, query: &RangeQuery) -> CommandResult {
    Ok(match args.item_ref(0)?.zset()? {
        Some(zset) => query.run(zset),
        None => empty_array(),
    })
}

/// ZRANGE command - Members by rank, score or lexicographic range
///
/// Syntax: ZRANGE key start stop [BYSCORE|BYLEX] [REV] [LIMIT offset count] [WITHSCORES]
pub struct ZRangeCommand;

impl Command for ZRangeCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let mut options: Vec<Bytes> = Vec::new();
        let (mut by_score, mut by_lex) = (false, false);
        for arg in &raw[3..] {
            if is_keyword(arg, "BYSCORE") {
                by_score = true;
            } else if is_keyword(arg, "BYLEX") {
                by_lex = true;
            } else {
                options.push(arg.clone());
            }
        }
        if by_score && by_lex {
            return Err(CommandError::Syntax);
        }

        let mut query = RangeQuery {
            by: RangeBy::Rank(0, 0),
            reverse: false,
            limit: None,
            with_scores: false,
        };
        // REV must be known before the bounds are read
        query.reverse = options.iter().any(|o| is_keyword(o, "REV"));
        let (lo, hi) = if query.reverse { (&raw[2], &raw[1]) } else { (&raw[1], &raw[2]) };
        query.by = if by_score {
            let (min, max) = parse_score_pair(lo, hi)?;
            RangeBy::Score(min, max)
        } else if by_lex {
            let (min, max) = parse_lex_pair(lo, hi)?;
            RangeBy::Lex(min, max)
        } else {
            RangeBy::Rank(parse_int(&raw[1])?, parse_int(&raw[2])?)
        };
        query.parse_options(&options, false)?;
        run_query(args, &query)
    }

    fn signature(&self) -> Signature {
        range_signature("zrange")
    }
}

/// ZRANGEBYSCORE command - Members within a score range, ascending
///
/// Syntax: ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]
pub struct ZRangeByScoreCommand;

impl Command for ZRangeByScoreCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (min, max) = parse_score_pair(&raw[1], &raw[2])?;
        let mut query = RangeQuery {
            by: RangeBy::Score(min, max),
            reverse: false,
            limit: None,
            with_scores: false,
        };
        query.parse_options(&raw[3..], true)?;
        query.reverse = false;
        run_query(args, &query)
    }

    fn signature(&self) -> Signature {
        range_signature("zrangebyscore")
    }
}

/// ZREVRANGEBYSCORE command - Members within a score range, descending
///
/// Syntax: ZREVRANGEBYSCORE key max min [WITHSCORES] [LIMIT offset count]
pub struct ZRevRangeByScoreCommand;

impl Command for ZRevRangeByScoreCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (min, max) = parse_score_pair(&raw[2], &raw[1])?;
        let mut query = RangeQuery {
            by: RangeBy::Score(min, max),
            reverse: true,
            limit: None,
            with_scores: false,
        };
        query.parse_options(&raw[3..], true)?;
        query.reverse = true;
        run_query(args, &query)
    }

    fn signature(&self) -> Signature {
        range_signature("zrevrangebyscore")
    }
}

/// ZRANGEBYLEX command - Members within a lexicographic range
///
/// Syntax: ZRANGEBYLEX key min max [LIMIT offset count]
pub struct ZRangeByLexCommand;

impl Command for ZRangeByLexCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let (min, max) = parse_lex_pair(&raw[1], &raw[2])?;
        let mut query = RangeQuery {
            by: RangeBy::Lex(min, max),
            reverse: false,
            limit: None,
            with_scores: false,
        };
        query.parse_options(&raw[3..], true)?;
        query.reverse = false;
        run_query(args, &query)
    }

    fn signature(&self) -> Signature {
        range_signature("zrangebylex")
    }
}

#[derive(Debug, Clone, Copy)]
enum PopEnd {
    Min,
    Max,
}

fn pop_entries(zset: &mut SortedSet, end: PopEnd, count: usize) -> Vec<(Bytes, f64)> {
    match end {
        PopEnd::Min => zset.pop_min(count),
        PopEnd::Max => zset.pop_max(count),
    }
}

fn pop_generic(ctx: &CommandContext, args: &mut Args, end: PopEnd, name: &str) -> CommandResult {
    let count = match args.len() {
        1 => 1,
        2 => parse_count(args.raw(1))?,
        _ => return Err(ctx.arity_error(name)),
    };
    let zset = args.item(0)?.zset_mut()?;
    let popped = pop_entries(zset, end, count);
    Ok(entries_reply(popped.iter().map(|(m, s)| (m, *s)), true))
}

fn blocking_pop(ctx: &mut CommandContext, args: &mut Args, end: PopEnd) -> CommandResult {
    let (timeout_arg, keys) = args.raw_all().split_last().ok_or(CommandError::Syntax)?;
    let timeout = parse_timeout(timeout_arg)?;
    let keys = keys.to_vec();

    let reply = ctx.block(timeout, |ctx, _first| {
        for key in &keys {
            let mut item = ctx.resolve(key, Some(ValueKind::SortedSet))?;
            if !item.exists() {
                continue;
            }
            let popped = pop_entries(item.zset_mut()?, end, 1);
            ctx.write_back(item, true);
            if let Some((member, score)) = popped.into_iter().next() {
                return Ok(Some(RespValue::array(vec![
                    RespValue::bulk_string(key.clone()),
                    RespValue::bulk_string(member),
                    RespValue::double(score),
                ])));
            }
        }
        Ok(None)
    })?;

    Ok(reply.unwrap_or(RespValue::NullArray))
}

/// ZPOPMIN command - Remove and return the lowest-scored members
///
/// Syntax: ZPOPMIN key [count]
pub struct ZPopMinCommand;

impl Command for ZPopMinCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        pop_generic(ctx, args, PopEnd::Min, "zpopmin")
    }

    fn signature(&self) -> Signature {
        Signature::new("zpopmin", vec![Param::typed(ValueKind::SortedSet).or_reply(empty_array())])
            .repeat(vec![Param::Bytes])
    }
}

/// ZPOPMAX command - Remove and return the highest-scored members
///
/// Syntax: ZPOPMAX key [count]
pub struct ZPopMaxCommand;

impl Command for ZPopMaxCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        pop_generic(ctx, args, PopEnd::Max, "zpopmax")
    }

    fn signature(&self) -> Signature {
        Signature::new("zpopmax", vec![Param::typed(ValueKind::SortedSet).or_reply(empty_array())])
            .repeat(vec![Param::Bytes])
    }
}

/// BZPOPMIN command - Blocking ZPOPMIN over several keys
///
/// Syntax: BZPOPMIN key [key ...] timeout
pub struct BZPopMinCommand;

impl Command for BZPopMinCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        blocking_pop(ctx, args, PopEnd::Min)
    }

    fn signature(&self) -> Signature {
        Signature::new("bzpopmin", vec![Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// BZPOPMAX command - Blocking ZPOPMAX over several keys
///
/// Syntax: BZPOPMAX key [key ...] timeout
pub struct BZPopMaxCommand;

impl Command for BZPopMaxCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        blocking_pop(ctx, args, PopEnd::Max)
    }

    fn signature(&self) -> Signature {
        Signature::new("bzpopmax", vec![Param::Bytes, Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

/// ZSCAN command - Incrementally iterate members and scores
///
/// Syntax: ZSCAN key cursor [MATCH pattern] [COUNT count]
pub struct ZScanCommand;

impl Command for ZScanCommand {
    fn execute(&self, _ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let options = ScanOptions::parse(&args.raw_all()[1..], false)?;
        let Some(zset) = args.item_ref(0)?.zset()? else {
            return Ok(scan_reply(0, Vec::new()));
        };

        // member order keeps cursors stable while scores change
        let mut members: Vec<(&Bytes, f64)> = zset.iter().collect();
        members.sort_by(|a, b| a.0.cmp(b.0));

        let (next, window) = options.page(&members);
        let mut found = Vec::new();
        for (member, score) in window {
            if options.matches(member) {
                found.push((*member).clone());
                found.push(Bytes::from(crate::protocol::format_double(*score)));
            }
        }
        Ok(scan_reply(next, found))
    }

    fn signature(&self) -> Signature {
        Signature::new("zscan", vec![Param::typed(ValueKind::SortedSet), Param::Bytes]).repeat(vec![Param::Bytes])
    }
}
