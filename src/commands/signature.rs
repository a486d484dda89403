//! Command signatures and argument validation
//!
//! A signature is a fixed prefix of typed parameter slots plus an optional
//! repeating suffix. Validation runs in two passes: non-key arguments are
//! decoded first (and absent keys may short-circuit the command), then the
//! remaining key slots are resolved into `CommandItem`s.

use super::item::CommandItem;
use crate::config::ServerType;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::zset::{parse_float, LexBound, ScoreBound};
use crate::store::{Database, ValueKind};
use bitflags::bitflags;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

bitflags! {
    /// Behavioural flags of a command
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// Rejected when called from a script
        const NO_SCRIPT = 1 << 0;
        /// Write-back keeps empty containers
        const LEAVE_EMPTY_VAL = 1 << 1;
        /// Runs immediately even inside MULTI
        const TX_EXEMPT = 1 << 2;
        /// Never creates a key that was absent
        const DO_NOT_CREATE = 1 << 3;
    }
}

/// What a key slot does when the key is absent
#[derive(Debug, Clone, PartialEq)]
pub enum Missing {
    /// Hand the handler an empty item
    Resolve,
    /// Hand the handler an empty container of the slot's kind
    Default,
    /// Skip the handler and reply with this value
    Shortcut(RespValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeySlot {
    pub kind: Option<ValueKind>,
    pub missing: Missing,
}

/// One typed argument slot
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Key(KeySlot),
    Bytes,
    Int,
    Float,
    Score,
    Lex,
    /// Blocking timeout in seconds (float, 0 = forever)
    Timeout,
    DbIndex,
}

impl Param {
    /// A key of any kind
    pub fn key() -> Param {
        Param::Key(KeySlot {
            kind: None,
            missing: Missing::Resolve,
        })
    }

    /// A key that must hold `kind` when present
    pub fn typed(kind: ValueKind) -> Param {
        Param::Key(KeySlot {
            kind: Some(kind),
            missing: Missing::Resolve,
        })
    }

    /// Materialise an empty container when the key is absent
    pub fn or_default(self) -> Param {
        self.with_missing(Missing::Default)
    }

    /// Reply with `value` without running the handler when the key is absent
    pub fn or_reply(self, value: RespValue) -> Param {
        self.with_missing(Missing::Shortcut(value))
    }

    fn with_missing(self, missing: Missing) -> Param {
        match self {
            Param::Key(slot) => Param::Key(KeySlot { missing, ..slot }),
            other => other,
        }
    }
}

/// Declared shape of a command
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: &'static str,
    pub fixed: Vec<Param>,
    pub repeat: Vec<Param>,
    pub flags: Flags,
    /// Server flavours offering the command (`None` = all)
    pub server_types: Option<Vec<ServerType>>,
}

/// Argument decoded in the first pass
#[derive(Debug, Clone, PartialEq)]
enum Decoded {
    Raw,
    Int(i64),
    Float(f64),
    Score(ScoreBound),
    Lex(LexBound),
    Timeout(Option<Duration>),
    DbIndex(usize),
    /// Index into `Args::items`
    Key(usize),
}

/// Outcome of validation
#[derive(Debug)]
pub enum Validated {
    Run(Args),
    Shortcut(RespValue),
}

impl Signature {
    pub fn new(name: &'static str, fixed: Vec<Param>) -> Self {
        Signature {
            name,
            fixed,
            repeat: Vec::new(),
            flags: Flags::empty(),
            server_types: None,
        }
    }

    pub fn repeat(mut self, repeat: Vec<Param>) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn server_types(mut self, types: &[ServerType]) -> Self {
        self.server_types = Some(types.to_vec());
        self
    }

    pub fn has(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    /// Whether the command exists on this server flavour
    pub fn available_on(&self, server_type: ServerType) -> bool {
        self.server_types
            .as_ref()
            .map_or(true, |types| types.contains(&server_type))
    }

    /// Check the argument count (command name excluded)
    pub fn check_arity(&self, n: usize, version: u8) -> Result<(), CommandError> {
        let fixed = self.fixed.len();
        let ok = if self.repeat.is_empty() {
            n == fixed
        } else {
            n >= fixed && (n - fixed) % self.repeat.len() == 0
        };
        if ok {
            Ok(())
        } else {
            Err(CommandError::WrongArity {
                command: self.name.to_string(),
                version,
            })
        }
    }

    fn param(&self, i: usize) -> &Param {
        if i < self.fixed.len() {
            &self.fixed[i]
        } else {
            &self.repeat[(i - self.fixed.len()) % self.repeat.len()]
        }
    }

    /// Decode arguments and resolve keys against `db`
    ///
    /// Arity must already have been checked.
    pub fn validate(&self, raw: Vec<Bytes>, db: &mut Database, databases: usize) -> Result<Validated, CommandError> {
        let mut values = Vec::with_capacity(raw.len());

        // pass 1: plain arguments and not-found shortcuts
        for (i, arg) in raw.iter().enumerate() {
            let decoded = match self.param(i) {
                Param::Bytes | Param::Key(_) => Decoded::Raw,
                Param::Int => Decoded::Int(parse_int(arg)?),
                Param::Float => Decoded::Float(parse_float(arg).ok_or(CommandError::NotFloat)?),
                Param::Score => Decoded::Score(ScoreBound::parse(arg).ok_or(CommandError::InvalidScoreRange)?),
                Param::Lex => Decoded::Lex(LexBound::parse(arg).ok_or(CommandError::InvalidLexRange)?),
                Param::Timeout => Decoded::Timeout(parse_timeout(arg)?),
                Param::DbIndex => {
                    let index = parse_int(arg)?;
                    if index < 0 || index as usize >= databases {
                        return Err(CommandError::InvalidDbIndex);
                    }
                    Decoded::DbIndex(index as usize)
                }
            };
            if let Param::Key(KeySlot { missing: Missing::Shortcut(reply), .. }) = self.param(i) {
                if !db.contains(arg) {
                    return Ok(Validated::Shortcut(reply.clone()));
                }
            }
            values.push(decoded);
        }

        // pass 2: key resolution and type checks
        let mut items: Vec<CommandItem> = Vec::new();
        let mut seen: HashMap<Bytes, usize> = HashMap::new();
        for (i, arg) in raw.iter().enumerate() {
            let Param::Key(slot) = self.param(i) else {
                continue;
            };
            if let Some(&existing) = seen.get(arg) {
                check_kind(&items[existing], slot)?;
                values[i] = Decoded::Key(existing);
                continue;
            }

            let default = match (&slot.missing, slot.kind) {
                (Missing::Default, Some(kind)) if !self.has(Flags::DO_NOT_CREATE) => Some(kind),
                _ => None,
            };
            let item = CommandItem::resolve(db, arg.clone(), default);
            check_kind(&item, slot)?;
            seen.insert(arg.clone(), items.len());
            values[i] = Decoded::Key(items.len());
            items.push(item);
        }

        Ok(Validated::Run(Args { raw, values, items }))
    }
}

fn check_kind(item: &CommandItem, slot: &KeySlot) -> Result<(), CommandError> {
    match (slot.kind, item.kind()) {
        (Some(expected), Some(actual)) if expected != actual => Err(CommandError::WrongType),
        _ => Ok(()),
    }
}

/// Parse a signed 64-bit integer argument
pub fn parse_int(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .filter(|s| !s.starts_with('+') && !(s.len() > 1 && s.starts_with('0')) && !s.starts_with("-0"))
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotInteger)
}

/// Longest blocking timeout accepted, in seconds
const MAX_TIMEOUT_SECS: f64 = (i64::MAX / 1000) as f64;

/// Parse a blocking timeout in seconds; zero means wait forever
pub fn parse_timeout(raw: &[u8]) -> Result<Option<Duration>, CommandError> {
    let secs = parse_float(raw).ok_or(CommandError::TimeoutNotFloat)?;
    if secs < 0.0 {
        return Err(CommandError::TimeoutNegative);
    }
    if secs == 0.0 {
        return Ok(None);
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(CommandError::TimeoutOutOfRange);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| CommandError::TimeoutOutOfRange)
}

/// Decoded arguments and resolved keys handed to a handler
#[derive(Debug)]
pub struct Args {
    raw: Vec<Bytes>,
    values: Vec<Decoded>,
    items: Vec<CommandItem>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw bytes of argument `i`
    pub fn raw(&self, i: usize) -> &Bytes {
        &self.raw[i]
    }

    pub fn raw_all(&self) -> &[Bytes] {
        &self.raw
    }

    pub fn int(&self, i: usize) -> Result<i64, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Int(n)) => Ok(*n),
            _ => parse_int(&self.raw[i]),
        }
    }

    pub fn float(&self, i: usize) -> Result<f64, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Float(f)) => Ok(*f),
            _ => parse_float(&self.raw[i]).ok_or(CommandError::NotFloat),
        }
    }

    pub fn score(&self, i: usize) -> Result<ScoreBound, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Score(bound)) => Ok(*bound),
            _ => ScoreBound::parse(&self.raw[i]).ok_or(CommandError::InvalidScoreRange),
        }
    }

    pub fn lex(&self, i: usize) -> Result<LexBound, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Lex(bound)) => Ok(bound.clone()),
            _ => LexBound::parse(&self.raw[i]).ok_or(CommandError::InvalidLexRange),
        }
    }

    pub fn timeout(&self, i: usize) -> Result<Option<Duration>, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Timeout(t)) => Ok(*t),
            _ => parse_timeout(&self.raw[i]),
        }
    }

    pub fn db_index(&self, i: usize) -> Result<usize, CommandError> {
        match self.values.get(i) {
            Some(Decoded::DbIndex(n)) => Ok(*n),
            _ => Err(CommandError::InvalidDbIndex),
        }
    }

    /// The item resolved for key argument `i`
    pub fn item(&mut self, i: usize) -> Result<&mut CommandItem, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Key(index)) => Ok(&mut self.items[*index]),
            _ => Err(CommandError::Syntax),
        }
    }

    pub fn item_ref(&self, i: usize) -> Result<&CommandItem, CommandError> {
        match self.values.get(i) {
            Some(Decoded::Key(index)) => Ok(&self.items[*index]),
            _ => Err(CommandError::Syntax),
        }
    }

    /// Two distinct items at once
    pub fn item_pair(&mut self, a: usize, b: usize) -> Result<(&mut CommandItem, &mut CommandItem), CommandError> {
        let (ia, ib) = match (self.values.get(a), self.values.get(b)) {
            (Some(Decoded::Key(ia)), Some(Decoded::Key(ib))) if ia != ib => (*ia, *ib),
            _ => return Err(CommandError::Syntax),
        };
        if ia < ib {
            let (left, right) = self.items.split_at_mut(ib);
            Ok((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.items.split_at_mut(ia);
            Ok((&mut right[0], &mut left[ib]))
        }
    }

    /// Every distinct resolved item, in first-seen order
    pub fn items_mut(&mut self) -> &mut [CommandItem] {
        &mut self.items
    }

    pub(crate) fn take_items(&mut self) -> Vec<CommandItem> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Item, Value};
    use parking_lot::Condvar;
    use std::sync::Arc;

    fn db() -> Database {
        Database::new(0, Arc::new(Condvar::new()))
    }

    fn raw(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect()
    }

    #[test]
    fn test_arity_fixed_and_repeat() {
        let get = Signature::new("get", vec![Param::key()]);
        assert!(get.check_arity(1, 7).is_ok());
        assert!(get.check_arity(2, 7).is_err());

        let hset = Signature::new("hset", vec![Param::key(), Param::Bytes, Param::Bytes])
            .repeat(vec![Param::Bytes, Param::Bytes]);
        assert!(hset.check_arity(3, 7).is_ok());
        assert!(hset.check_arity(5, 7).is_ok());
        assert!(hset.check_arity(4, 7).is_err());
        assert!(hset.check_arity(1, 7).is_err());

        let err = get.check_arity(0, 6).unwrap_err();
        assert_eq!(err.to_string(), "ERR wrong number of arguments for 'get' command");
    }

    #[test]
    fn test_decode_errors() {
        let sig = Signature::new("incrby", vec![Param::key(), Param::Int]);
        let err = sig.validate(raw(&["k", "x"]), &mut db(), 16).unwrap_err();
        assert_eq!(err, CommandError::NotInteger);

        let sig = Signature::new("select", vec![Param::DbIndex]);
        assert_eq!(sig.validate(raw(&["16"]), &mut db(), 16).unwrap_err(), CommandError::InvalidDbIndex);

        let sig = Signature::new("blpop", vec![Param::key(), Param::Timeout]);
        assert_eq!(sig.validate(raw(&["k", "-1"]), &mut db(), 16).unwrap_err(), CommandError::TimeoutNegative);
    }

    #[test]
    fn test_shortcut_on_missing_key() {
        let sig = Signature::new("llen", vec![Param::typed(ValueKind::List).or_reply(RespValue::integer(0))]);
        match sig.validate(raw(&["missing"]), &mut db(), 16).unwrap() {
            Validated::Shortcut(reply) => assert_eq!(reply, RespValue::integer(0)),
            Validated::Run(_) => panic!("expected shortcut"),
        }
    }

    #[test]
    fn test_wrong_type_before_handler() {
        let mut db = db();
        db.insert(Bytes::from("k"), Item::new(Value::string("v")));
        let sig = Signature::new("llen", vec![Param::typed(ValueKind::List).or_reply(RespValue::integer(0))]);
        assert_eq!(sig.validate(raw(&["k"]), &mut db, 16).unwrap_err(), CommandError::WrongType);
    }

    #[test]
    fn test_default_container_and_shared_items() {
        let sig = Signature::new("rpoplpush", vec![Param::typed(ValueKind::List).or_default(), Param::typed(ValueKind::List)]);
        let Validated::Run(mut args) = sig.validate(raw(&["a", "a"]), &mut db(), 16).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(args.items_mut().len(), 1);
        assert!(args.item(0).unwrap().list().unwrap().is_some());
        assert!(args.item_pair(0, 1).is_err());
    }

    #[test]
    fn test_do_not_create_skips_default() {
        let sig = Signature::new("x", vec![Param::typed(ValueKind::Set).or_default()]).flags(Flags::DO_NOT_CREATE);
        let Validated::Run(mut args) = sig.validate(raw(&["s"]), &mut db(), 16).unwrap() else {
            panic!("expected run");
        };
        assert!(args.item(0).unwrap().set_members().unwrap().is_none());
    }

    #[test]
    fn test_parse_int_rejects_padding() {
        assert_eq!(parse_int(b"42"), Ok(42));
        assert_eq!(parse_int(b"-7"), Ok(-7));
        assert_eq!(parse_int(b"0"), Ok(0));
        assert!(parse_int(b"+1").is_err());
        assert!(parse_int(b"01").is_err());
        assert!(parse_int(b" 1").is_err());
        assert!(parse_int(b"9223372036854775808").is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(b"0"), Ok(None));
        assert_eq!(parse_timeout(b"1.5"), Ok(Some(Duration::from_millis(1500))));
        assert_eq!(parse_timeout(b"abc"), Err(CommandError::TimeoutNotFloat));
        assert_eq!(parse_timeout(b"1e19"), Err(CommandError::TimeoutOutOfRange));
    }
}
