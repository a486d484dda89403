//! Incremental command framer
//!
//! Turns an unbounded stream of byte chunks into complete argument lists.
//! Chunk boundaries may fall anywhere, including inside a length header or
//! a payload: the framer keeps its position in `phase` and picks up again
//! on the next `feed` call.

use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

const CRLF: &[u8] = b"\r\n";

/// Longest header line accepted before giving up on a frame
const MAX_HEADER_LEN: usize = 64;

/// Largest bulk payload accepted (512 MiB, as the real server)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest argument count accepted
const MAX_ARRAY_LEN: i64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Waiting for `*<n>\r\n`
    ArrayHeader,
    /// Waiting for `$<len>\r\n`
    BulkHeader,
    /// Waiting for `len` payload bytes plus CRLF
    BulkPayload(usize),
}

/// Resumable parser state
#[derive(Debug)]
pub struct Framer {
    buffer: BytesMut,
    phase: Phase,
    remaining: usize,
    fields: Vec<Bytes>,
}

impl Framer {
    pub fn new() -> Self {
        Framer {
            buffer: BytesMut::with_capacity(4096),
            phase: Phase::ArrayHeader,
            remaining: 0,
            fields: Vec::new(),
        }
    }

    /// Feed a chunk and collect every frame it completes
    ///
    /// An empty result means more bytes are needed. An error means the
    /// stream is corrupt; the framer must not be fed again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<Bytes>>, ProtocolError> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            match self.phase {
                Phase::ArrayHeader => {
                    let Some(count) = self.read_header(b'*', "multibulk")? else {
                        break;
                    };
                    if count <= 0 {
                        debug!("Ignoring frame with {} fields", count);
                        continue;
                    }
                    self.remaining = count as usize;
                    self.fields = Vec::with_capacity(self.remaining);
                    self.phase = Phase::BulkHeader;
                }
                Phase::BulkHeader => {
                    let Some(len) = self.read_header(b'$', "bulk")? else {
                        break;
                    };
                    if len < 0 || len > MAX_BULK_LEN {
                        return Err(ProtocolError::InvalidLength {
                            what: "bulk",
                            text: len.to_string(),
                        });
                    }
                    self.phase = Phase::BulkPayload(len as usize);
                }
                Phase::BulkPayload(len) => {
                    if self.buffer.len() < len + CRLF.len() {
                        break;
                    }
                    let payload = self.buffer.split_to(len).freeze();
                    if &self.buffer[..CRLF.len()] != CRLF {
                        return Err(ProtocolError::MissingCrlf);
                    }
                    self.buffer.advance(CRLF.len());
                    self.fields.push(payload);
                    self.remaining -= 1;

                    if self.remaining == 0 {
                        frames.push(std::mem::take(&mut self.fields));
                        self.phase = Phase::ArrayHeader;
                    } else {
                        self.phase = Phase::BulkHeader;
                    }
                }
            }
        }

        Ok(frames)
    }

    /// Whether a frame is partially buffered
    pub fn is_mid_frame(&self) -> bool {
        self.phase != Phase::ArrayHeader || !self.buffer.is_empty()
    }

    /// Read `<marker><integer>\r\n`, or `None` if the line is not complete yet
    fn read_header(&mut self, marker: u8, what: &'static str) -> Result<Option<i64>, ProtocolError> {
        if let Some(&first) = self.buffer.first() {
            if first != marker {
                return Err(ProtocolError::UnexpectedByte {
                    expected: marker as char,
                    got: first as char,
                });
            }
        }

        let Some(end) = find_crlf(&self.buffer) else {
            if self.buffer.len() > MAX_HEADER_LEN {
                return Err(ProtocolError::HeaderTooLong(what));
            }
            return Ok(None);
        };

        let line = self.buffer.split_to(end + CRLF.len());
        let text = &line[1..end];
        let value = std::str::from_utf8(text)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| ProtocolError::InvalidLength {
                what,
                text: String::from_utf8_lossy(text).into_owned(),
            })?;

        if marker == b'*' && value > MAX_ARRAY_LEN {
            return Err(ProtocolError::InvalidLength {
                what,
                text: value.to_string(),
            });
        }

        Ok(Some(value))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(frame: &[Bytes]) -> Vec<&[u8]> {
        frame.iter().map(|b| b.as_ref()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut framer = Framer::new();
        let frames = framer.feed(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(fields(&frames[0]), vec![&b"GET"[..], &b"foo"[..]]);
        assert!(!framer.is_mid_frame());
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nhello\r\n";
        let mut framer = Framer::new();
        let mut frames = Vec::new();
        for byte in input.iter() {
            frames.extend(framer.feed(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(fields(&frames[0]), vec![&b"SET"[..], &b"k"[..], &b"hello"[..]]);
    }

    #[test]
    fn test_split_inside_payload_and_crlf() {
        let mut framer = Framer::new();
        assert!(framer.feed(b"*1\r\n$4\r\nPI").unwrap().is_empty());
        assert!(framer.is_mid_frame());
        assert!(framer.feed(b"NG\r").unwrap().is_empty());
        let frames = framer.feed(b"\n").unwrap();
        assert_eq!(fields(&frames[0]), vec![&b"PING"[..]]);
    }

    #[test]
    fn test_pipelined_frames_and_binary_payload() {
        let mut framer = Framer::new();
        let frames = framer
            .feed(b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$4\r\na\r\nb\r\n")
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(fields(&frames[1]), vec![&b"ECHO"[..], &b"a\r\nb"[..]]);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut framer = Framer::new();
        let frames = framer.feed(b"*0\r\n*1\r\n$4\r\nPING\r\n").unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_malformed_headers_are_fatal() {
        assert!(matches!(
            Framer::new().feed(b"+OK\r\n"),
            Err(ProtocolError::UnexpectedByte { .. })
        ));
        assert!(matches!(
            Framer::new().feed(b"*x\r\n"),
            Err(ProtocolError::InvalidLength { .. })
        ));
        assert!(matches!(
            Framer::new().feed(b"*1\r\n$-5\r\n"),
            Err(ProtocolError::InvalidLength { .. })
        ));
        assert!(matches!(
            Framer::new().feed(b"*1\r\n$2\r\nabcd"),
            Err(ProtocolError::MissingCrlf)
        ));
        assert!(matches!(
            Framer::new().feed(b"*1\r\n:1\r\n"),
            Err(ProtocolError::UnexpectedByte { expected: '$', .. })
        ));
    }

    #[test]
    fn test_runaway_header() {
        let junk = vec![b'1'; 100];
        let mut framer = Framer::new();
        framer.feed(b"*").unwrap();
        assert!(matches!(framer.feed(&junk), Err(ProtocolError::HeaderTooLong(_))));
    }
}
