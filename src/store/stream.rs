//! Stream with consumer groups
//!
//! Entries form an append-only log ordered by id. Each consumer group keeps a
//! last-delivered id, its consumers and a Pending Entries List (PEL) of
//! delivered but unacknowledged ids.

use crate::error::CommandError;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// `<milliseconds>-<sequence>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId { ms: u64::MAX, seq: u64::MAX };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// Parse `ms` or `ms-seq`; a missing sequence becomes `missing_seq`
    pub fn parse_with_default(raw: &[u8], missing_seq: u64) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        match text.split_once('-') {
            Some((ms, seq)) => Some(StreamId {
                ms: ms.parse().ok()?,
                seq: seq.parse().ok()?,
            }),
            None => Some(StreamId {
                ms: text.parse().ok()?,
                seq: missing_seq,
            }),
        }
    }

    /// Parse an id given as a plain argument (`ms` means `ms-0`)
    pub fn parse(raw: &[u8]) -> Option<Self> {
        Self::parse_with_default(raw, 0)
    }

    /// The smallest id strictly greater than this one
    pub fn next(&self) -> Option<StreamId> {
        if self.seq < u64::MAX {
            Some(StreamId::new(self.ms, self.seq + 1))
        } else if self.ms < u64::MAX {
            Some(StreamId::new(self.ms + 1, 0))
        } else {
            None
        }
    }

    /// The largest id strictly smaller than this one
    pub fn prev(&self) -> Option<StreamId> {
        if self.seq > 0 {
            Some(StreamId::new(self.ms, self.seq - 1))
        } else if self.ms > 0 {
            Some(StreamId::new(self.ms - 1, u64::MAX))
        } else {
            None
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Id requested by XADD
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdSpec {
    /// `*`
    Auto,
    /// `<ms>-*`
    AutoSeq(u64),
    /// `<ms>-<seq>` or `<ms>`
    Explicit(StreamId),
}

impl IdSpec {
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw == b"*" {
            return Some(IdSpec::Auto);
        }
        if let Some(ms) = raw.strip_suffix(b"-*") {
            let ms = std::str::from_utf8(ms).ok()?.parse().ok()?;
            return Some(IdSpec::AutoSeq(ms));
        }
        StreamId::parse(raw).map(IdSpec::Explicit)
    }
}

/// How XTRIM / XADD decide what to drop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrimStrategy {
    MaxLen(usize),
    MinId(StreamId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<Bytes>,
}

/// One PEL record
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub consumer: Bytes,
    pub delivery_count: u64,
    pub delivered_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consumer {
    pub name: Bytes,
    pub seen_time: u64,
    pub active_time: Option<u64>,
}

/// Where XREADGROUP starts reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupStart {
    /// `>`: entries never delivered to the group
    New,
    /// Replay of the consumer's own pending entries after this id
    Pending(StreamId),
}

/// Options for XCLAIM
#[derive(Debug, Clone, Default)]
pub struct ClaimOptions {
    pub min_idle_ms: u64,
    pub idle_ms: Option<u64>,
    pub time_ms: Option<u64>,
    pub retry_count: Option<u64>,
    pub force: bool,
    pub just_id: bool,
}

/// Reply of a group read: the entry fields are `None` when the entry was deleted
pub type DeliveredEntry = (StreamId, Option<Vec<Bytes>>);

/// Result of XAUTOCLAIM
#[derive(Debug, Clone, PartialEq)]
pub struct AutoClaim {
    pub next: StreamId,
    pub claimed: Vec<StreamEntry>,
    pub deleted: Vec<StreamId>,
}

/// Summary form of XPENDING
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSummary {
    pub count: usize,
    pub smallest: Option<StreamId>,
    pub largest: Option<StreamId>,
    pub per_consumer: Vec<(Bytes, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerGroup {
    pub name: Bytes,
    pub last_delivered: StreamId,
    pub entries_read: Option<u64>,
    consumers: BTreeMap<Bytes, Consumer>,
    pel: BTreeMap<StreamId, PendingEntry>,
}

impl ConsumerGroup {
    fn new(name: Bytes, last_delivered: StreamId, entries_read: Option<u64>) -> Self {
        ConsumerGroup {
            name,
            last_delivered,
            entries_read,
            consumers: BTreeMap::new(),
            pel: BTreeMap::new(),
        }
    }

    pub fn consumers(&self) -> impl Iterator<Item = &Consumer> {
        self.consumers.values()
    }

    pub fn pending_len(&self) -> usize {
        self.pel.len()
    }

    pub fn pending_for(&self, consumer: &[u8]) -> usize {
        self.pel.values().filter(|p| p.consumer.as_ref() == consumer).count()
    }

    pub fn pending_entry(&self, id: &StreamId) -> Option<&PendingEntry> {
        self.pel.get(id)
    }

    /// Create a consumer; returns false if it already existed
    pub fn create_consumer(&mut self, name: Bytes, now: u64) -> bool {
        if self.consumers.contains_key(&name) {
            return false;
        }
        self.consumers.insert(
            name.clone(),
            Consumer {
                name,
                seen_time: now,
                active_time: None,
            },
        );
        true
    }

    /// Delete a consumer and its pending entries; returns how many were pending
    pub fn delete_consumer(&mut self, name: &[u8]) -> usize {
        if self.consumers.remove(name).is_none() {
            return 0;
        }
        let before = self.pel.len();
        self.pel.retain(|_, p| p.consumer.as_ref() != name);
        before - self.pel.len()
    }

    /// Acknowledge ids; returns how many were pending
    pub fn ack(&mut self, ids: &[StreamId]) -> usize {
        ids.iter().filter(|id| self.pel.remove(id).is_some()).count()
    }

    pub fn pending_summary(&self) -> PendingSummary {
        let mut per_consumer: BTreeMap<Bytes, usize> = BTreeMap::new();
        for entry in self.pel.values() {
            *per_consumer.entry(entry.consumer.clone()).or_default() += 1;
        }
        PendingSummary {
            count: self.pel.len(),
            smallest: self.pel.keys().next().copied(),
            largest: self.pel.keys().next_back().copied(),
            per_consumer: per_consumer.into_iter().collect(),
        }
    }

    /// Extended XPENDING: `(id, consumer, idle, deliveries)` within the range
    pub fn pending_range(
        &self,
        start: StreamId,
        end: StreamId,
        count: usize,
        consumer: Option<&[u8]>,
        min_idle_ms: u64,
        now: u64,
    ) -> Vec<(StreamId, Bytes, u64, u64)> {
        if start > end {
            return Vec::new();
        }
        self.pel
            .range(start..=end)
            .filter(|(_, p)| consumer.map_or(true, |c| p.consumer.as_ref() == c))
            .filter(|(_, p)| now.saturating_sub(p.delivered_at) >= min_idle_ms)
            .take(count)
            .map(|(id, p)| (*id, p.consumer.clone(), now.saturating_sub(p.delivered_at), p.delivery_count))
            .collect()
    }

    fn touch_consumer(&mut self, name: &Bytes, now: u64, active: bool) {
        let consumer = self.consumers.entry(name.clone()).or_insert_with(|| Consumer {
            name: name.clone(),
            seen_time: now,
            active_time: None,
        });
        consumer.seen_time = now;
        if active {
            consumer.active_time = Some(now);
        }
    }
}

/// Append-only log of entries plus consumer groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    entries: Vec<StreamEntry>,
    last_id: StreamId,
    entries_added: u64,
    max_deleted_id: StreamId,
    groups: BTreeMap<Bytes, ConsumerGroup>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last id ever generated, even if that entry was since removed
    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    pub fn entries_added(&self) -> u64 {
        self.entries_added
    }

    pub fn max_deleted_id(&self) -> StreamId {
        self.max_deleted_id
    }

    pub fn first_entry(&self) -> Option<&StreamEntry> {
        self.entries.first()
    }

    pub fn last_entry(&self) -> Option<&StreamEntry> {
        self.entries.last()
    }

    pub fn get(&self, id: &StreamId) -> Option<&StreamEntry> {
        self.entries
            .binary_search_by(|e| e.id.cmp(id))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Turn an XADD id request into a concrete id greater than the tail
    pub fn resolve_id(&self, spec: IdSpec, now_ms: u64) -> Result<StreamId, CommandError> {
        let last = self.last_id;
        let id = match spec {
            IdSpec::Auto => {
                if now_ms > last.ms {
                    StreamId::new(now_ms, 0)
                } else {
                    last.next().ok_or(CommandError::StreamIdTooSmall)?
                }
            }
            IdSpec::AutoSeq(ms) => {
                if ms < last.ms {
                    return Err(CommandError::StreamIdTooSmall);
                }
                if ms == last.ms && !(ms == 0 && self.entries_added == 0) {
                    if last.seq == u64::MAX {
                        return Err(CommandError::StreamIdTooSmall);
                    }
                    StreamId::new(ms, last.seq + 1)
                } else if ms == 0 {
                    StreamId::new(0, 1)
                } else {
                    StreamId::new(ms, 0)
                }
            }
            IdSpec::Explicit(id) => {
                if id == StreamId::MIN {
                    return Err(CommandError::StreamIdZero);
                }
                id
            }
        };

        if id <= last {
            return Err(CommandError::StreamIdTooSmall);
        }
        Ok(id)
    }

    /// Append an entry; the stream is left unchanged on error
    pub fn add(&mut self, fields: Vec<Bytes>, spec: IdSpec, now_ms: u64) -> Result<StreamId, CommandError> {
        let id = self.resolve_id(spec, now_ms)?;
        self.entries.push(StreamEntry { id, fields });
        self.last_id = id;
        self.entries_added += 1;
        Ok(id)
    }

    /// Drop entries from the head; returns how many were removed
    pub fn trim(&mut self, strategy: TrimStrategy, limit: Option<usize>) -> usize {
        let mut n = match strategy {
            TrimStrategy::MaxLen(max) => self.entries.len().saturating_sub(max),
            TrimStrategy::MinId(min) => self.entries.partition_point(|e| e.id < min),
        };
        if let Some(limit) = limit {
            if limit > 0 {
                n = n.min(limit);
            }
        }
        if n > 0 {
            let removed_max = self.entries[n - 1].id;
            self.entries.drain(..n);
            self.max_deleted_id = self.max_deleted_id.max(removed_max);
        }
        n
    }

    /// Delete entries by id; returns how many existed
    pub fn delete(&mut self, ids: &[StreamId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Ok(pos) = self.entries.binary_search_by(|e| e.id.cmp(id)) {
                self.entries.remove(pos);
                self.max_deleted_id = self.max_deleted_id.max(*id);
                removed += 1;
            }
        }
        removed
    }

    /// Entries with `start <= id <= end`, ascending or descending
    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>, reverse: bool) -> Vec<&StreamEntry> {
        if start > end {
            return Vec::new();
        }
        let lo = self.entries.partition_point(|e| e.id < start);
        let hi = self.entries.partition_point(|e| e.id <= end);
        let slice = &self.entries[lo..hi.max(lo)];
        let limit = count.unwrap_or(usize::MAX);
        if reverse {
            slice.iter().rev().take(limit).collect()
        } else {
            slice.iter().take(limit).collect()
        }
    }

    /// Entries with ids strictly greater than `after`
    pub fn read_after(&self, after: StreamId, count: Option<usize>) -> Vec<&StreamEntry> {
        let lo = self.entries.partition_point(|e| e.id <= after);
        self.entries[lo..].iter().take(count.unwrap_or(usize::MAX)).collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = &ConsumerGroup> {
        self.groups.values()
    }

    pub fn group(&self, name: &[u8]) -> Option<&ConsumerGroup> {
        self.groups.get(name)
    }

    pub fn group_mut(&mut self, name: &[u8]) -> Option<&mut ConsumerGroup> {
        self.groups.get_mut(name)
    }

    /// Create a consumer group starting after `last_delivered`
    pub fn create_group(&mut self, name: Bytes, last_delivered: StreamId, entries_read: Option<u64>) -> Result<(), CommandError> {
        if self.groups.contains_key(&name) {
            return Err(CommandError::BusyGroup);
        }
        self.groups.insert(name.clone(), ConsumerGroup::new(name, last_delivered, entries_read));
        Ok(())
    }

    pub fn destroy_group(&mut self, name: &[u8]) -> bool {
        self.groups.remove(name).is_some()
    }

    /// Entries the group has not consumed yet (`None` if unknown)
    pub fn lag(&self, group: &ConsumerGroup) -> Option<u64> {
        if self.entries.is_empty() {
            return Some(0);
        }
        group.entries_read.map(|read| self.entries_added.saturating_sub(read))
    }

    /// XREADGROUP for one stream; `None` when the group does not exist
    pub fn group_read(
        &mut self,
        group_name: &[u8],
        consumer: &Bytes,
        start: GroupStart,
        count: Option<usize>,
        noack: bool,
        now: u64,
    ) -> Option<Vec<DeliveredEntry>> {
        let group = self.groups.get_mut(group_name)?;
        let limit = count.unwrap_or(usize::MAX);

        let delivered = match start {
            GroupStart::New => {
                let lo = self.entries.partition_point(|e| e.id <= group.last_delivered);
                let fresh: Vec<&StreamEntry> = self.entries[lo..].iter().take(limit).collect();
                group.touch_consumer(consumer, now, !fresh.is_empty());

                let mut out = Vec::with_capacity(fresh.len());
                for entry in fresh {
                    group.last_delivered = entry.id;
                    group.entries_read = Some(group.entries_read.map_or(1, |n| n + 1));
                    if !noack {
                        group.pel.insert(
                            entry.id,
                            PendingEntry {
                                consumer: consumer.clone(),
                                delivery_count: 1,
                                delivered_at: now,
                            },
                        );
                    }
                    out.push((entry.id, Some(entry.fields.clone())));
                }
                out
            }
            GroupStart::Pending(after) => {
                group.touch_consumer(consumer, now, false);
                let entries = &self.entries;
                let mut out = Vec::new();
                for (id, pending) in group.pel.range_mut(after.next().unwrap_or(StreamId::MAX)..) {
                    if out.len() >= limit {
                        break;
                    }
                    if pending.consumer != *consumer {
                        continue;
                    }
                    pending.delivery_count += 1;
                    pending.delivered_at = now;
                    let fields = entries
                        .binary_search_by(|e| e.id.cmp(id))
                        .ok()
                        .map(|i| entries[i].fields.clone());
                    out.push((*id, fields));
                }
                out
            }
        };

        Some(delivered)
    }

    /// XCLAIM; `None` when the group does not exist
    pub fn claim(
        &mut self,
        group_name: &[u8],
        consumer: &Bytes,
        ids: &[StreamId],
        opts: &ClaimOptions,
        now: u64,
    ) -> Option<Vec<StreamEntry>> {
        let group = self.groups.get_mut(group_name)?;
        let entries = &self.entries;
        let lookup = |id: &StreamId| {
            entries
                .binary_search_by(|e| e.id.cmp(id))
                .ok()
                .map(|i| &entries[i])
        };

        let mut claimed = Vec::new();
        for id in ids {
            let Some(entry) = lookup(id) else {
                // pending reference to a deleted entry
                group.pel.remove(id);
                continue;
            };

            if !group.pel.contains_key(id) {
                if !opts.force {
                    continue;
                }
                group.pel.insert(
                    *id,
                    PendingEntry {
                        consumer: consumer.clone(),
                        delivery_count: 0,
                        delivered_at: now,
                    },
                );
            } else if opts.min_idle_ms > 0 {
                let idle = group.pel.get(id).map_or(0, |p| now.saturating_sub(p.delivered_at));
                if idle < opts.min_idle_ms {
                    continue;
                }
            }

            if let Some(pending) = group.pel.get_mut(id) {
                pending.consumer = consumer.clone();
                pending.delivered_at = match (opts.idle_ms, opts.time_ms) {
                    (Some(idle), _) => now.saturating_sub(idle),
                    (None, Some(time)) => time,
                    (None, None) => now,
                };
                if let Some(retry) = opts.retry_count {
                    pending.delivery_count = retry;
                } else if !opts.just_id {
                    pending.delivery_count += 1;
                }
            }
            claimed.push(entry.clone());
        }

        group.touch_consumer(consumer, now, !claimed.is_empty());
        Some(claimed)
    }

    /// XAUTOCLAIM; `None` when the group does not exist
    pub fn autoclaim(
        &mut self,
        group_name: &[u8],
        consumer: &Bytes,
        min_idle_ms: u64,
        start: StreamId,
        count: usize,
        just_id: bool,
        now: u64,
    ) -> Option<AutoClaim> {
        let group = self.groups.get_mut(group_name)?;
        let entries = &self.entries;

        let mut claimed = Vec::new();
        let mut deleted = Vec::new();
        let mut attempts = count.saturating_mul(10);
        let mut next = StreamId::MIN;

        let candidates: Vec<StreamId> = group.pel.range(start..).map(|(id, _)| *id).collect();
        let mut iter = candidates.into_iter();
        for id in iter.by_ref() {
            if attempts == 0 || claimed.len() >= count {
                next = id;
                break;
            }
            attempts -= 1;

            let existing = entries
                .binary_search_by(|e| e.id.cmp(&id))
                .ok()
                .map(|i| &entries[i]);
            let Some(entry) = existing else {
                group.pel.remove(&id);
                deleted.push(id);
                continue;
            };

            if let Some(pending) = group.pel.get_mut(&id) {
                if now.saturating_sub(pending.delivered_at) < min_idle_ms {
                    continue;
                }
                pending.consumer = consumer.clone();
                pending.delivered_at = now;
                if !just_id {
                    pending.delivery_count += 1;
                }
                claimed.push(entry.clone());
            }
        }

        group.touch_consumer(consumer, now, !claimed.is_empty());
        Some(AutoClaim { next, claimed, deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[&str]) -> Vec<Bytes> {
        pairs.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    fn id(ms: u64, seq: u64) -> StreamId {
        StreamId::new(ms, seq)
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(StreamId::parse(b"5-3"), Some(id(5, 3)));
        assert_eq!(StreamId::parse(b"5"), Some(id(5, 0)));
        assert_eq!(StreamId::parse_with_default(b"5", u64::MAX), Some(id(5, u64::MAX)));
        assert_eq!(StreamId::parse(b"x-1"), None);
        assert_eq!(IdSpec::parse(b"*"), Some(IdSpec::Auto));
        assert_eq!(IdSpec::parse(b"7-*"), Some(IdSpec::AutoSeq(7)));
        assert_eq!(IdSpec::parse(b"7-1"), Some(IdSpec::Explicit(id(7, 1))));
        assert_eq!(IdSpec::parse(b"-*"), None);
    }

    #[test]
    fn test_auto_ids_increase() {
        let mut s = Stream::new();
        let a = s.add(fields(&["f", "v"]), IdSpec::Auto, 1000).unwrap();
        let b = s.add(fields(&["f", "v"]), IdSpec::Auto, 1000).unwrap();
        let c = s.add(fields(&["f", "v"]), IdSpec::Auto, 999).unwrap();
        assert_eq!(a, id(1000, 0));
        assert_eq!(b, id(1000, 1));
        assert_eq!(c, id(1000, 2));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_partial_ids() {
        let mut s = Stream::new();
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::AutoSeq(0), 0).unwrap(), id(0, 1));
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::AutoSeq(0), 0).unwrap(), id(0, 2));
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::AutoSeq(5), 0).unwrap(), id(5, 0));
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::AutoSeq(4), 0), Err(CommandError::StreamIdTooSmall));
    }

    #[test]
    fn test_explicit_ids_must_increase() {
        let mut s = Stream::new();
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::Explicit(id(0, 0)), 0), Err(CommandError::StreamIdZero));
        s.add(fields(&["a", "1"]), IdSpec::Explicit(id(5, 5)), 0).unwrap();
        let before = s.clone();
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::Explicit(id(5, 5)), 0), Err(CommandError::StreamIdTooSmall));
        assert_eq!(s.add(fields(&["a", "1"]), IdSpec::Explicit(id(4, 9)), 0), Err(CommandError::StreamIdTooSmall));
        assert_eq!(s, before);
    }

    #[test]
    fn test_trim_and_delete_keep_last_id() {
        let mut s = Stream::new();
        for ms in 1..=5 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        assert_eq!(s.trim(TrimStrategy::MaxLen(3), None), 2);
        assert_eq!(s.first_entry().map(|e| e.id), Some(id(3, 0)));
        assert_eq!(s.trim(TrimStrategy::MinId(id(5, 0)), Some(1)), 1);
        assert_eq!(s.len(), 2);
        assert_eq!(s.delete(&[id(5, 0), id(9, 9)]), 1);
        assert_eq!(s.last_id(), id(5, 0));
        assert_eq!(s.max_deleted_id(), id(5, 0));
        assert!(s.add(fields(&["n", "x"]), IdSpec::Explicit(id(5, 0)), 0).is_err());
    }

    #[test]
    fn test_ranges() {
        let mut s = Stream::new();
        for ms in 1..=4 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        let ids: Vec<StreamId> = s.range(id(2, 0), StreamId::MAX, None, false).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![id(2, 0), id(3, 0), id(4, 0)]);
        let ids: Vec<StreamId> = s.range(StreamId::MIN, StreamId::MAX, Some(2), true).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![id(4, 0), id(3, 0)]);
        assert_eq!(s.read_after(id(3, 0), None).len(), 1);
        assert!(s.range(id(3, 0), id(2, 0), None, false).is_empty());
    }

    #[test]
    fn test_group_read_ack_and_replay() {
        let mut s = Stream::new();
        for ms in 1..=3 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        s.create_group(Bytes::from("g"), StreamId::MIN, None).unwrap();
        assert_eq!(s.create_group(Bytes::from("g"), StreamId::MIN, None), Err(CommandError::BusyGroup));

        let alice = Bytes::from("alice");
        let got = s.group_read(b"g", &alice, GroupStart::New, Some(2), false, 100).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(s.group(b"g").unwrap().last_delivered, id(2, 0));
        assert_eq!(s.group(b"g").unwrap().pending_len(), 2);

        // history replay bumps the delivery counter
        let replay = s.group_read(b"g", &alice, GroupStart::Pending(StreamId::MIN), None, false, 200).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(s.group(b"g").unwrap().pending_entry(&id(1, 0)).unwrap().delivery_count, 2);

        // deleted entries replay with no fields
        s.delete(&[id(1, 0)]);
        let replay = s.group_read(b"g", &alice, GroupStart::Pending(StreamId::MIN), None, false, 300).unwrap();
        assert_eq!(replay[0], (id(1, 0), None));

        assert_eq!(s.group_mut(b"g").unwrap().ack(&[id(1, 0), id(2, 0), id(3, 0)]), 2);
        assert_eq!(s.group(b"g").unwrap().pending_len(), 0);
        assert!(s.group_read(b"missing", &alice, GroupStart::New, None, false, 0).is_none());
    }

    #[test]
    fn test_noack_skips_pel() {
        let mut s = Stream::new();
        s.add(fields(&["n", "x"]), IdSpec::Explicit(id(1, 0)), 0).unwrap();
        s.create_group(Bytes::from("g"), StreamId::MIN, Some(0)).unwrap();
        let got = s.group_read(b"g", &Bytes::from("c"), GroupStart::New, None, true, 0).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(s.group(b"g").unwrap().pending_len(), 0);
        assert_eq!(s.group(b"g").unwrap().entries_read, Some(1));
    }

    #[test]
    fn test_claim_respects_idle_and_drops_deleted() {
        let mut s = Stream::new();
        for ms in 1..=3 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        s.create_group(Bytes::from("g"), StreamId::MIN, None).unwrap();
        s.group_read(b"g", &Bytes::from("alice"), GroupStart::New, None, false, 1_000).unwrap();

        let bob = Bytes::from("bob");
        let opts = ClaimOptions { min_idle_ms: 500, ..Default::default() };
        let claimed = s.claim(b"g", &bob, &[id(1, 0)], &opts, 1_200).unwrap();
        assert!(claimed.is_empty());

        s.delete(&[id(2, 0)]);
        let claimed = s.claim(b"g", &bob, &[id(1, 0), id(2, 0)], &opts, 2_000).unwrap();
        assert_eq!(claimed.len(), 1);
        let group = s.group(b"g").unwrap();
        let pending = group.pending_entry(&id(1, 0)).unwrap();
        assert_eq!(pending.consumer, bob);
        assert_eq!(pending.delivery_count, 2);
        assert!(group.pending_entry(&id(2, 0)).is_none());
        assert_eq!(group.pending_for(b"alice"), 1);
    }

    #[test]
    fn test_autoclaim_cursor() {
        let mut s = Stream::new();
        for ms in 1..=4 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        s.create_group(Bytes::from("g"), StreamId::MIN, None).unwrap();
        s.group_read(b"g", &Bytes::from("alice"), GroupStart::New, None, false, 0).unwrap();
        s.delete(&[id(1, 0)]);

        let bob = Bytes::from("bob");
        let result = s.autoclaim(b"g", &bob, 10, StreamId::MIN, 2, false, 100).unwrap();
        assert_eq!(result.deleted, vec![id(1, 0)]);
        assert_eq!(result.claimed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![id(2, 0), id(3, 0)]);
        assert_eq!(result.next, id(4, 0));

        let result = s.autoclaim(b"g", &bob, 10, result.next, 2, true, 100).unwrap();
        assert_eq!(result.claimed.len(), 1);
        assert_eq!(result.next, StreamId::MIN);
        assert_eq!(s.group(b"g").unwrap().pending_entry(&id(4, 0)).unwrap().delivery_count, 1);
    }

    #[test]
    fn test_pending_views_and_consumers() {
        let mut s = Stream::new();
        for ms in 1..=3 {
            s.add(fields(&["n", "x"]), IdSpec::Explicit(id(ms, 0)), 0).unwrap();
        }
        s.create_group(Bytes::from("g"), StreamId::MIN, None).unwrap();
        s.group_read(b"g", &Bytes::from("a"), GroupStart::New, Some(1), false, 0).unwrap();
        s.group_read(b"g", &Bytes::from("b"), GroupStart::New, None, false, 50).unwrap();

        let group = s.group(b"g").unwrap();
        let summary = group.pending_summary();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.smallest, Some(id(1, 0)));
        assert_eq!(summary.largest, Some(id(3, 0)));
        assert_eq!(summary.per_consumer, vec![(Bytes::from("a"), 1), (Bytes::from("b"), 2)]);

        let idle = group.pending_range(StreamId::MIN, StreamId::MAX, 10, None, 60, 100);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].0, id(1, 0));

        let group = s.group_mut(b"g").unwrap();
        assert!(!group.create_consumer(Bytes::from("a"), 0));
        assert!(group.create_consumer(Bytes::from("c"), 0));
        assert_eq!(group.delete_consumer(b"b"), 2);
        assert_eq!(group.consumers().count(), 2);
    }
}
