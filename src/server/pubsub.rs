//! Pub/sub registry and session outboxes
//!
//! Subscriber tables map channels and patterns to session ids. Messages are
//! pushed onto each subscriber's outbox, which transports drain in FIFO order.

use crate::protocol::RespValue;
use crate::store::{Pattern, SessionId};
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Outbound reply queue of one session
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Mutex<VecDeque<RespValue>>,
    ready: Condvar,
    notify: Notify,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: RespValue) {
        self.queue.lock().push_back(value);
        self.ready.notify_all();
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<RespValue> {
        self.queue.lock().pop_front()
    }

    /// Wait up to `timeout` for the next value
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RespValue> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return Some(value);
            }
            if self.ready.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    pub fn drain(&self) -> Vec<RespValue> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once something was pushed (async transports)
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Shared subscriber tables
#[derive(Debug, Default)]
pub struct PubSub {
    channels: BTreeMap<Bytes, BTreeSet<SessionId>>,
    patterns: BTreeMap<Bytes, (Pattern, BTreeSet<SessionId>)>,
    outboxes: HashMap<SessionId, Arc<Outbox>>,
}

impl PubSub {
    pub fn register(&mut self, session: SessionId, outbox: Arc<Outbox>) {
        self.outboxes.insert(session, outbox);
    }

    /// Drop every registration of a session
    pub fn remove_session(&mut self, session: SessionId) {
        self.channels.retain(|_, subs| {
            subs.remove(&session);
            !subs.is_empty()
        });
        self.patterns.retain(|_, (_, subs)| {
            subs.remove(&session);
            !subs.is_empty()
        });
        self.outboxes.remove(&session);
    }

    pub fn subscribe(&mut self, session: SessionId, channel: Bytes) {
        self.channels.entry(channel).or_default().insert(session);
    }

    pub fn unsubscribe(&mut self, session: SessionId, channel: &[u8]) {
        if let Some(subs) = self.channels.get_mut(channel) {
            subs.remove(&session);
            if subs.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    pub fn psubscribe(&mut self, session: SessionId, pattern: Bytes) {
        self.patterns
            .entry(pattern.clone())
            .or_insert_with(|| (Pattern::compile(&pattern), BTreeSet::new()))
            .1
            .insert(session);
    }

    pub fn punsubscribe(&mut self, session: SessionId, pattern: &[u8]) {
        if let Some((_, subs)) = self.patterns.get_mut(pattern) {
            subs.remove(&session);
            if subs.is_empty() {
                self.patterns.remove(pattern);
            }
        }
    }

    /// Deliver a message; returns how many subscriptions received it
    pub fn publish(&self, channel: &Bytes, message: &Bytes) -> usize {
        let mut receivers = 0;

        if let Some(subs) = self.channels.get(channel) {
            for session in subs {
                if let Some(outbox) = self.outboxes.get(session) {
                    outbox.push(RespValue::bulk_array([
                        Bytes::from_static(b"message"),
                        channel.clone(),
                        message.clone(),
                    ]));
                    receivers += 1;
                }
            }
        }

        for (pattern_text, (pattern, subs)) in &self.patterns {
            if !pattern.matches(channel) {
                continue;
            }
            for session in subs {
                if let Some(outbox) = self.outboxes.get(session) {
                    outbox.push(RespValue::bulk_array([
                        Bytes::from_static(b"pmessage"),
                        pattern_text.clone(),
                        channel.clone(),
                        message.clone(),
                    ]));
                    receivers += 1;
                }
            }
        }

        receivers
    }

    /// Active channels, optionally filtered by a glob
    pub fn channels(&self, filter: Option<&Pattern>) -> Vec<Bytes> {
        self.channels
            .keys()
            .filter(|ch| filter.map_or(true, |p| p.matches(ch)))
            .cloned()
            .collect()
    }

    pub fn numsub(&self, channel: &[u8]) -> usize {
        self.channels.get(channel).map_or(0, BTreeSet::len)
    }

    pub fn numpat(&self) -> usize {
        self.patterns.len()
    }
}
