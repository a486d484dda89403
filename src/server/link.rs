//! In-process transport
//!
//! `FakeLink` stands in for a client's socket: bytes written to it are framed
//! and executed against a `Session` right away, and the replies wait on the
//! session outbox until the client reads them.

use super::{Outbox, Server};
use crate::dispatch::Session;
use crate::error::LinkError;
use crate::protocol::{Framer, RespEncoder, RespValue};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client-side view of one emulated connection
pub struct FakeLink {
    server: Arc<Server>,
    session: Option<Session>,
    framer: Framer,
    outbox: Arc<Outbox>,
    up: bool,
}

impl FakeLink {
    /// Open a link with a fresh session
    pub fn new(server: Arc<Server>) -> Self {
        let session = server.session();
        let outbox = session.outbox();
        FakeLink {
            server,
            session: Some(session),
            framer: Framer::new(),
            outbox,
            up: true,
        }
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Whether both the link and the server are up
    pub fn is_connected(&self) -> bool {
        self.up && self.server.is_connected()
    }

    /// Whether the session behind the link is gone (QUIT or protocol error)
    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Write raw protocol bytes
    ///
    /// Every frame the bytes complete is executed before this returns; a
    /// blocking command therefore blocks the caller.
    pub fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.check_up()?;
        let Some(session) = self.session.as_mut() else {
            return Err(LinkError::Closed);
        };

        let frames = match self.framer.feed(data) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Protocol error on session {}: {}", session.id(), e);
                self.shutdown();
                return Err(e.into());
            }
        };

        for frame in frames {
            let Some(session) = self.session.as_mut() else {
                break;
            };
            let reply = session.execute(frame);
            if !matches!(reply, RespValue::NoReply) {
                self.outbox.push(reply);
            }
            if session.is_quitting() {
                debug!("Session {} quit", session.id());
                self.shutdown();
            }
        }
        Ok(())
    }

    /// Encode and send one command
    pub fn send_command<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<(), LinkError> {
        let frame = RespValue::array(
            args.iter()
                .map(|arg| RespValue::bulk_string(Bytes::copy_from_slice(arg.as_ref())))
                .collect(),
        );
        self.send(&RespEncoder::encode(&frame))
    }

    /// The next queued reply or push message, if any
    pub fn read_response(&mut self) -> Result<Option<RespValue>, LinkError> {
        self.check_up()?;
        match self.outbox.pop() {
            Some(value) => Ok(Some(value)),
            None if self.session.is_none() => Err(LinkError::Closed),
            None => Ok(None),
        }
    }

    /// Wait up to `timeout` for the next reply or push message
    pub fn wait_response(&mut self, timeout: Duration) -> Result<Option<RespValue>, LinkError> {
        self.check_up()?;
        if self.session.is_none() && self.outbox.is_empty() {
            return Err(LinkError::Closed);
        }
        Ok(self.outbox.pop_timeout(timeout))
    }

    /// Everything queued so far, RESP2-encoded
    pub fn read_bytes(&mut self) -> Result<Bytes, LinkError> {
        self.check_up()?;
        let mut buf = BytesMut::new();
        for value in self.outbox.drain() {
            RespEncoder::encode_to(&mut buf, &value);
        }
        Ok(buf.freeze())
    }

    /// Send one command and read its reply
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<RespValue, LinkError> {
        self.send_command(args)?;
        self.read_response()?.ok_or(LinkError::Closed)
    }

    /// Drop the link, losing the session and anything still queued
    pub fn disconnect(&mut self) {
        if self.up {
            debug!("Link disconnected");
        }
        self.up = false;
        self.shutdown();
        self.outbox.drain();
    }

    /// Re-establish the link with a new session
    pub fn connect(&mut self) -> Result<(), LinkError> {
        if !self.server.is_connected() {
            return Err(LinkError::ConnectionDown);
        }
        if self.up && self.session.is_some() {
            return Ok(());
        }
        let session = self.server.session();
        self.outbox = session.outbox();
        self.session = Some(session);
        self.framer = Framer::new();
        self.up = true;
        Ok(())
    }

    fn check_up(&self) -> Result<(), LinkError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(LinkError::ConnectionDown)
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl Drop for FakeLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FakeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeLink")
            .field("up", &self.up)
            .field("session", &self.session.as_ref().map(Session::id))
            .finish()
    }
}
