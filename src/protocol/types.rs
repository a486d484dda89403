//! RESP2 reply values
//!
//! Every command produces exactly one of the five logical shapes: integer,
//! status string, bulk string (or null), error, array (or null array).

use bytes::Bytes;
use std::fmt;

/// One reply, in one of the RESP2 shapes
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Status line (`+OK`)
    SimpleString(String),

    /// Error line, prefix included (`-ERR ...`)
    Error(String),

    Integer(i64),

    /// Binary-safe payload
    BulkString(Bytes),

    /// Nil bulk reply (`$-1`)
    Null,

    Array(Vec<RespValue>),

    /// Nil array reply (`*-1`), e.g. an aborted EXEC
    NullArray,

    /// Nothing is written back; the command pushed its replies itself
    /// (subscribe confirmations go straight to the session outbox).
    NoReply,
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// The `+OK` status
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Error reply; `s` must start with its category
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Bulk string holding the shortest round-trip form of a float
    pub fn double(value: f64) -> Self {
        RespValue::BulkString(Bytes::from(format_double(value)))
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(v: Vec<RespValue>) -> Self {
        RespValue::Array(v)
    }

    /// Array of bulk strings
    pub fn bulk_array<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        RespValue::Array(items.into_iter().map(|b| RespValue::BulkString(b.into())).collect())
    }

    pub fn is_array(&self) -> bool {
        matches!(self, RespValue::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    pub fn as_array(&self) -> Option<&Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_bulk_string(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Render a float the way the server does (`inf`, `-inf`, integral values without a fraction)
pub fn format_double(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if value == value.trunc() && value.abs() < 1e17 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "+{}", s),
            RespValue::Error(e) => write!(f, "-{}", e),
            RespValue::Integer(i) => write!(f, ":{}", i),
            RespValue::BulkString(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(items) => write!(f, "[{} items]", items.len()),
            RespValue::NullArray => write!(f, "(nil array)"),
            RespValue::NoReply => write!(f, "(no reply)"),
        }
    }
}

impl From<crate::error::CommandError> for RespValue {
    fn from(err: crate::error::CommandError) -> Self {
        RespValue::Error(err.to_string())
    }
}
