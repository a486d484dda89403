//! Property tests for the core primitives

use bytes::Bytes;
use proptest::prelude::*;
use redemu::protocol::{Framer, RespEncoder};
use redemu::store::stream::{IdSpec, Stream, StreamId};
use redemu::store::zset::ScoreBound;
use redemu::store::SortedSet;
use redemu::{Item, ManualClock, RespValue, Server, ServerConfig, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn encode_command(fields: &[Vec<u8>]) -> Bytes {
    RespEncoder::encode(&RespValue::array(
        fields
            .iter()
            .map(|f| RespValue::bulk_string(Bytes::copy_from_slice(f)))
            .collect(),
    ))
}

fn command_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..5)
}

proptest! {
    #[test]
    fn framer_ignores_chunk_boundaries(
        commands in prop::collection::vec(command_strategy(), 1..6),
        sizes in prop::collection::vec(1usize..12, 1..40),
    ) {
        let mut wire = Vec::new();
        for command in &commands {
            wire.extend_from_slice(&encode_command(command));
        }

        let mut framer = Framer::new();
        let mut frames = Vec::new();
        let mut rest = &wire[..];
        let mut sizes = sizes.iter().cycle();
        while !rest.is_empty() {
            let take = (*sizes.next().unwrap()).min(rest.len());
            frames.extend(framer.feed(&rest[..take]).unwrap());
            rest = &rest[take..];
        }

        let decoded: Vec<Vec<Vec<u8>>> = frames
            .into_iter()
            .map(|frame| frame.into_iter().map(|f| f.to_vec()).collect())
            .collect();
        prop_assert_eq!(decoded, commands);
        prop_assert!(!framer.is_mid_frame());
    }

    #[test]
    fn expiry_is_monotonic(expire_at in 1_000u64..10_000, now in 0u64..20_000) {
        let clock = ManualClock::new(0);
        let server = Server::with_clock(ServerConfig::default(), Arc::new(clock.clone()));
        server.with_database(0, |db| {
            db.insert(Bytes::from("k"), Item::with_expiration(Value::string("v"), expire_at));
        });

        clock.set_ms(now);
        let visible = server.with_database(0, |db| db.contains(b"k")).unwrap();
        prop_assert_eq!(visible, now <= expire_at);

        // once gone, it stays gone
        clock.set_ms(now.max(expire_at + 1));
        prop_assert!(!server.with_database(0, |db| db.contains(b"k")).unwrap());
    }

    #[test]
    fn scan_returns_every_key_once(
        keys in prop::collection::btree_set("[a-z]{1,6}", 0..40),
        count in 1usize..15,
    ) {
        let server = Server::new(ServerConfig::default());
        let mut session = server.session();
        for key in &keys {
            session.execute(vec![Bytes::from("SET"), Bytes::from(key.clone()), Bytes::from("v")]);
        }

        let mut seen = Vec::new();
        let mut cursor = Bytes::from("0");
        loop {
            let reply = session.execute(vec![
                Bytes::from("SCAN"),
                cursor.clone(),
                Bytes::from("COUNT"),
                Bytes::from(count.to_string()),
            ]);
            let parts = reply.as_array().unwrap().clone();
            cursor = parts[0].as_bulk_string().unwrap().clone();
            for key in parts[1].as_array().unwrap() {
                seen.push(String::from_utf8(key.as_bulk_string().unwrap().to_vec()).unwrap());
            }
            if &cursor[..] == b"0" {
                break;
            }
        }

        seen.sort();
        let expected: Vec<String> = keys.into_iter().collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn sorted_set_rank_and_count_agree(
        ops in prop::collection::vec(("[a-h]", -20i32..20, any::<bool>()), 1..60),
        lo in -25i32..25,
        span in 0i32..30,
    ) {
        let mut zset = SortedSet::new();
        let mut model: BTreeMap<String, f64> = BTreeMap::new();
        for (member, score, add) in ops {
            if add {
                zset.insert(Bytes::from(member.clone()), score as f64);
                model.insert(member, score as f64);
            } else {
                zset.remove(member.as_bytes());
                model.remove(&member);
            }
        }

        prop_assert_eq!(zset.len(), model.len());
        for (member, score) in &model {
            let lower = model
                .iter()
                .filter(|(m, s)| (**s, m.as_str()) < (*score, member.as_str()))
                .count();
            prop_assert_eq!(zset.rank(member.as_bytes()), Some(lower));
            prop_assert_eq!(zset.score(member.as_bytes()), Some(*score));
        }

        let (lo, hi) = (lo as f64, (lo + span) as f64);
        let expected = model.values().filter(|s| **s >= lo && **s <= hi).count();
        prop_assert_eq!(
            zset.count_by_score(&ScoreBound::inclusive(lo), &ScoreBound::inclusive(hi)),
            expected
        );
    }

    #[test]
    fn stream_ids_only_grow(
        steps in prop::collection::vec((any::<bool>(), 0u64..50, 0u64..5), 1..40),
        clock in prop::collection::vec(0u64..60, 1..40),
    ) {
        let mut stream = Stream::new();
        let mut times = clock.iter().cycle();
        for (auto, ms, seq) in steps {
            let before = stream.clone();
            let previous = stream.last_id();
            let now = *times.next().unwrap();
            let spec = if auto {
                IdSpec::Auto
            } else {
                IdSpec::Explicit(StreamId::new(ms, seq))
            };

            match stream.add(vec![Bytes::from("f"), Bytes::from("v")], spec, now) {
                Ok(id) => prop_assert!(id > previous),
                Err(_) => {
                    prop_assert!(!auto);
                    prop_assert!(StreamId::new(ms, seq) <= previous);
                    prop_assert_eq!(&stream, &before);
                }
            }
        }
    }
}

#[test]
fn scan_match_filters_after_windowing() {
    let server = Server::new(ServerConfig::default());
    let mut session = server.session();
    let keys: BTreeSet<&str> = ["a1", "b1", "a2", "b2", "a3", "b3"].into_iter().collect();
    for key in &keys {
        session.execute(vec![Bytes::from("SET"), Bytes::copy_from_slice(key.as_bytes()), Bytes::from("v")]);
    }

    let reply = session.execute(vec![
        Bytes::from("SCAN"),
        Bytes::from("0"),
        Bytes::from("MATCH"),
        Bytes::from("b*"),
        Bytes::from("COUNT"),
        Bytes::from("2"),
    ]);
    let parts = reply.as_array().unwrap();
    // the first window holds a1 and a2 only, so nothing matches yet
    assert_ne!(parts[0], RespValue::bulk_string("0"));
    assert_eq!(parts[1], RespValue::array(vec![]));
}
