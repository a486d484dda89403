//! Sorted set
//!
//! Two indexes mutated together: `scores` (member -> score) decides
//! membership, `ordered` (score, member pairs kept sorted) answers range and
//! rank queries by binary search. Ties on score order by member bytes.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One end of a score range (`1.5`, `(1.5`, `-inf`, `+inf`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        ScoreBound { value, exclusive: false }
    }

    /// Parse `[(]<float>`; `None` when the text is not a valid bound
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let (exclusive, rest) = match raw.first() {
            Some(b'(') => (true, &raw[1..]),
            _ => (false, raw),
        };
        let value = parse_float(rest)?;
        Some(ScoreBound { value, exclusive })
    }

    fn below_min(&self, score: f64) -> bool {
        if self.exclusive { score <= self.value } else { score < self.value }
    }

    fn within_max(&self, score: f64) -> bool {
        if self.exclusive { score < self.value } else { score <= self.value }
    }
}

/// One end of a lexicographic range (`-`, `+`, `[abc`, `(abc`)
#[derive(Debug, Clone, PartialEq)]
pub enum LexBound {
    NegInf,
    PosInf,
    Inclusive(Bytes),
    Exclusive(Bytes),
}

impl LexBound {
    pub fn parse(raw: &[u8]) -> Option<Self> {
        match raw.first() {
            Some(b'-') if raw.len() == 1 => Some(LexBound::NegInf),
            Some(b'+') if raw.len() == 1 => Some(LexBound::PosInf),
            Some(b'[') => Some(LexBound::Inclusive(Bytes::copy_from_slice(&raw[1..]))),
            Some(b'(') => Some(LexBound::Exclusive(Bytes::copy_from_slice(&raw[1..]))),
            _ => None,
        }
    }

    fn below_min(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Inclusive(b) => member < b.as_ref(),
            LexBound::Exclusive(b) => member <= b.as_ref(),
        }
    }

    fn within_max(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Inclusive(b) => member <= b.as_ref(),
            LexBound::Exclusive(b) => member < b.as_ref(),
        }
    }
}

/// Parse a float the way the server does: `inf`, `+inf`, `-inf` accepted, NaN rejected
pub fn parse_float(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?;
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => f64::INFINITY,
        "-inf" | "-infinity" => f64::NEG_INFINITY,
        other => {
            if other.is_empty() || other.starts_with(char::is_whitespace) || other.ends_with(char::is_whitespace) {
                return None;
            }
            other.parse::<f64>().ok()?
        }
    };
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn compare(a: (f64, &[u8]), b: (f64, &[u8])) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

/// A set of unique members, each with a score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ordered: Vec<(f64, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.scores.contains_key(member)
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Insert or rescore a member; returns whether anything changed
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        // -0.0 and 0.0 must sort together
        let score = if score == 0.0 { 0.0 } else { score };

        if let Some(&old) = self.scores.get(&member) {
            if old == score {
                return false;
            }
            if let Ok(pos) = self.position(old, &member) {
                self.ordered.remove(pos);
            }
        }

        let pos = self.position(score, &member).unwrap_or_else(|p| p);
        self.ordered.insert(pos, (score, member.clone()));
        self.scores.insert(member, score);
        true
    }

    /// Remove a member; returns whether it was present
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                if let Ok(pos) = self.position(score, member) {
                    self.ordered.remove(pos);
                }
                true
            }
            None => false,
        }
    }

    /// Zero-based rank in ascending order
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.position(score, member).ok()
    }

    /// Zero-based rank in descending order
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        self.rank(member).map(|r| self.len() - 1 - r)
    }

    /// Entry at an ascending rank
    pub fn get_by_rank(&self, rank: usize) -> Option<(&Bytes, f64)> {
        self.ordered.get(rank).map(|(s, m)| (m, *s))
    }

    /// Ascending iterator over (member, score)
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> + ExactSizeIterator {
        self.ordered.iter().map(|(s, m)| (m, *s))
    }

    /// Entries between two ranks, inclusive, already clamped by the caller
    pub fn range_by_rank(&self, start: usize, stop: usize) -> &[(f64, Bytes)] {
        if start > stop || start >= self.ordered.len() {
            return &[];
        }
        let stop = stop.min(self.ordered.len() - 1);
        &self.ordered[start..=stop]
    }

    /// Entries whose score lies within the bounds, ascending
    pub fn range_by_score(&self, min: &ScoreBound, max: &ScoreBound) -> &[(f64, Bytes)] {
        let lo = self.ordered.partition_point(|(s, _)| min.below_min(*s));
        let hi = self.ordered.partition_point(|(s, _)| max.within_max(*s));
        if lo < hi { &self.ordered[lo..hi] } else { &[] }
    }

    pub fn count_by_score(&self, min: &ScoreBound, max: &ScoreBound) -> usize {
        self.range_by_score(min, max).len()
    }

    /// Entries whose member lies within the bounds
    ///
    /// Only meaningful when every member has the same score.
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound) -> &[(f64, Bytes)] {
        let lo = self.ordered.partition_point(|(_, m)| min.below_min(m));
        let hi = self.ordered.partition_point(|(_, m)| max.within_max(m));
        if lo < hi { &self.ordered[lo..hi] } else { &[] }
    }

    pub fn count_by_lex(&self, min: &LexBound, max: &LexBound) -> usize {
        self.range_by_lex(min, max).len()
    }

    /// Remove and return up to `count` lowest entries
    pub fn pop_min(&mut self, count: usize) -> Vec<(Bytes, f64)> {
        let n = count.min(self.ordered.len());
        let popped: Vec<(f64, Bytes)> = self.ordered.drain(..n).collect();
        for (_, member) in &popped {
            self.scores.remove(member);
        }
        popped.into_iter().map(|(s, m)| (m, s)).collect()
    }

    /// Remove and return up to `count` highest entries, highest first
    pub fn pop_max(&mut self, count: usize) -> Vec<(Bytes, f64)> {
        let n = count.min(self.ordered.len());
        let start = self.ordered.len() - n;
        let popped: Vec<(f64, Bytes)> = self.ordered.drain(start..).rev().collect();
        for (_, member) in &popped {
            self.scores.remove(member);
        }
        popped.into_iter().map(|(s, m)| (m, s)).collect()
    }

    fn position(&self, score: f64, member: &[u8]) -> Result<usize, usize> {
        self.ordered
            .binary_search_by(|(s, m)| compare((*s, m.as_ref()), (score, member)))
    }
}
