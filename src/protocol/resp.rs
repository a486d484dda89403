//! RESP2 encoder
//!
//! Serialises reply values for the TCP listener and the in-process link.

use super::types::RespValue;
use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Serialises replies into RESP2 wire format
pub struct RespEncoder;

impl RespEncoder {
    /// Encode one reply into a fresh buffer
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Append one reply to `buf`; `NoReply` appends nothing
    pub fn encode_to(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(line) => put_line(buf, b'+', line.as_bytes()),
            RespValue::Error(line) => put_line(buf, b'-', line.as_bytes()),
            RespValue::Integer(n) => put_line(buf, b':', n.to_string().as_bytes()),
            RespValue::BulkString(payload) => {
                put_line(buf, b'$', payload.len().to_string().as_bytes());
                buf.put_slice(payload);
                buf.put_slice(CRLF);
            }
            RespValue::Null => put_line(buf, b'$', b"-1"),
            RespValue::Array(items) => {
                put_line(buf, b'*', items.len().to_string().as_bytes());
                for item in items {
                    Self::encode_to(buf, item);
                }
            }
            RespValue::NullArray => put_line(buf, b'*', b"-1"),
            RespValue::NoReply => {}
        }
    }
}

/// `<marker><text>\r\n`
fn put_line(buf: &mut BytesMut, marker: u8, text: &[u8]) {
    buf.reserve(text.len() + 3);
    buf.put_u8(marker);
    buf.put_slice(text);
    buf.put_slice(CRLF);
}
