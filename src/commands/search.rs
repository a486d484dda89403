//! Key search commands (KEYS, SCAN) and the option parser shared by the
//! per-type scans (HSCAN, SSCAN, ZSCAN)

use super::{is_keyword, parse_count, Args, Command, CommandContext, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::{scan, Pattern, ValueKind};
use bytes::Bytes;

const DEFAULT_SCAN_COUNT: usize = 10;

/// Parsed `cursor [MATCH pattern] [COUNT count] [TYPE type]`
#[derive(Debug)]
pub(crate) struct ScanOptions {
    pub cursor: u64,
    pub pattern: Option<Pattern>,
    pub count: usize,
    /// `Some(None)` when TYPE named an unknown type: nothing matches
    pub kind: Option<Option<ValueKind>>,
}

impl ScanOptions {
    /// Parse a cursor followed by options; TYPE is accepted only with `allow_type`
    pub fn parse(raw: &[Bytes], allow_type: bool) -> Result<Self, CommandError> {
        let cursor = std::str::from_utf8(&raw[0])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| CommandError::custom("ERR", "invalid cursor"))?;

        let mut options = ScanOptions {
            cursor,
            pattern: None,
            count: DEFAULT_SCAN_COUNT,
            kind: None,
        };

        let mut i = 1;
        while i < raw.len() {
            let value = raw.get(i + 1).ok_or(CommandError::Syntax)?;
            if is_keyword(&raw[i], "MATCH") {
                options.pattern = Some(Pattern::compile(value));
            } else if is_keyword(&raw[i], "COUNT") {
                options.count = parse_count(value)?;
                if options.count == 0 {
                    return Err(CommandError::Syntax);
                }
            } else if allow_type && is_keyword(&raw[i], "TYPE") {
                options.kind = Some(ValueKind::from_type_name(value));
            } else {
                return Err(CommandError::Syntax);
            }
            i += 2;
        }
        Ok(options)
    }

    pub fn matches(&self, text: &[u8]) -> bool {
        self.pattern.as_ref().map_or(true, |p| p.matches(text))
    }

    /// One page over `sorted`: the next cursor and the window, unfiltered
    pub fn page<'a, T>(&self, sorted: &'a [T]) -> (u64, &'a [T]) {
        scan::window(sorted, self.cursor, self.count)
    }
}

/// `[cursor, [items...]]`
pub(crate) fn scan_reply(next: u64, items: Vec<Bytes>) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(next.to_string()),
        RespValue::bulk_array(items),
    ])
}

/// KEYS command - All keys matching a glob pattern
///
/// Syntax: KEYS pattern
pub struct KeysCommand;

impl Command for KeysCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let pattern = Pattern::compile(args.raw(0));
        let mut keys: Vec<Bytes> = ctx.db().keys().into_iter().filter(|k| pattern.matches(k)).collect();
        keys.sort();
        Ok(RespValue::bulk_array(keys))
    }

    fn signature(&self) -> Signature {
        Signature::new("keys", vec![Param::Bytes])
    }
}

/// SCAN command - Incrementally iterate the keyspace
///
/// Syntax: SCAN cursor [MATCH pattern] [COUNT count] [TYPE type]
///
/// COUNT sizes the window of candidates; MATCH and TYPE are applied to the
/// window afterwards, so a page may hold fewer keys than COUNT.
pub struct ScanCommand;

impl Command for ScanCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let options = ScanOptions::parse(args.raw_all(), true)?;

        let db = ctx.db();
        let mut keys = db.keys();
        keys.sort();

        let (next, window) = options.page(&keys);
        let mut found = Vec::new();
        for key in window {
            if !options.matches(key) {
                continue;
            }
            if let Some(kind) = options.kind {
                let actual = db.get(key).map(|item| item.value.kind());
                if kind.is_none() || actual != kind {
                    continue;
                }
            }
            found.push(key.clone());
        }
        Ok(scan_reply(next, found))
    }

    fn signature(&self) -> Signature {
        Signature::new("scan", vec![Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{bulk, run, session};
    use super::*;
    use std::collections::BTreeSet;

    fn scan_all(s: &mut crate::dispatch::Session, extra: &[&str]) -> (Vec<String>, usize) {
        let mut cursor = "0".to_string();
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let mut cmd = vec!["SCAN", cursor.as_str()];
            cmd.extend_from_slice(extra);
            let reply = run(s, &cmd);
            let parts = reply.as_array().unwrap().clone();
            pages += 1;
            for key in parts[1].as_array().unwrap() {
                seen.push(String::from_utf8(key.as_bulk_string().unwrap().to_vec()).unwrap());
            }
            cursor = String::from_utf8(parts[0].as_bulk_string().unwrap().to_vec()).unwrap();
            if cursor == "0" {
                break;
            }
        }
        (seen, pages)
    }

    #[test]
    fn test_keys() {
        let mut s = session();
        for key in ["one", "two", "three"] {
            run(&mut s, &["SET", key, "1"]);
        }
        assert_eq!(run(&mut s, &["KEYS", "t*"]), bulk(&["three", "two"]));
        assert_eq!(run(&mut s, &["KEYS", "*"]), bulk(&["one", "three", "two"]));
    }

    #[test]
    fn test_scan_full_cycle() {
        let mut s = session();
        let expected: BTreeSet<String> = (0..25).map(|i| format!("key:{}", i)).collect();
        for key in &expected {
            run(&mut s, &["SET", key, "v"]);
        }
        let (seen, pages) = scan_all(&mut s, &["COUNT", "4"]);
        assert_eq!(seen.len(), expected.len());
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), expected);
        assert_eq!(pages, 7);
    }

    #[test]
    fn test_scan_filters_after_windowing() {
        let mut s = session();
        for i in 0..10 {
            run(&mut s, &["SET", &format!("a{}", i), "v"]);
        }
        run(&mut s, &["RPUSH", "list", "x"]);

        let (seen, _) = scan_all(&mut s, &["MATCH", "a*"]);
        assert_eq!(seen.len(), 10);

        let (seen, _) = scan_all(&mut s, &["TYPE", "list"]);
        assert_eq!(seen, vec!["list".to_string()]);

        let (seen, _) = scan_all(&mut s, &["TYPE", "nosuchtype"]);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_scan_errors() {
        let mut s = session();
        assert_eq!(run(&mut s, &["SCAN", "abc"]), RespValue::error("ERR invalid cursor"));
        assert_eq!(run(&mut s, &["SCAN", "0", "COUNT"]), RespValue::error("ERR syntax error"));
        assert_eq!(run(&mut s, &["SCAN", "0", "COUNT", "0"]), RespValue::error("ERR syntax error"));
        assert!(run(&mut s, &["SCAN", "0", "BOGUS", "x"]).is_error());
    }

    #[test]
    fn test_scan_empty_keyspace() {
        let mut s = session();
        assert_eq!(
            run(&mut s, &["SCAN", "0"]),
            RespValue::array(vec![RespValue::bulk_string("0"), RespValue::array(vec![])])
        );
    }

    #[test]
    fn test_scan_stale_cursor_after_shrink() {
        let mut s = session();
        for key in ["a", "b", "c", "d"] {
            run(&mut s, &["SET", key, "v"]);
        }
        assert_eq!(
            run(&mut s, &["SCAN", "5", "COUNT", "10"]),
            RespValue::array(vec![RespValue::bulk_string("0"), bulk(&["c", "d"])])
        );
    }
}
