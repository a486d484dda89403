//! Connection handling
//!
//! Serves one TCP client: reads bytes, frames them, runs the frames against
//! the client's session on the blocking pool and writes back the replies
//! together with any pub/sub pushes queued for the session.

use super::{Outbox, Server};
use crate::dispatch::Session;
use crate::protocol::{Framer, RespEncoder, RespValue};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tracing::{debug, warn};

/// Connection handler
pub struct Connection<S> {
    /// Client socket
    stream: S,

    framer: Framer,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a new connection handler
    pub fn new(stream: S) -> Self {
        Connection {
            stream,
            framer: Framer::new(),
        }
    }

    /// Handle the connection until the client leaves
    ///
    /// A framing error is answered with an error reply and ends the
    /// connection with that error.
    pub async fn handle(self, server: Arc<Server>) -> anyhow::Result<()> {
        let Connection { stream, mut framer } = self;
        let (mut reader, mut writer) = tokio::io::split(stream);

        let session = server.session();
        let outbox = session.outbox();
        let mut session = Some(session);
        let mut read_buffer = BytesMut::with_capacity(4096);

        let result: anyhow::Result<()> = loop {
            read_buffer.clear();
            tokio::select! {
                read = reader.read_buf(&mut read_buffer) => {
                    let n = match read {
                        Ok(n) => n,
                        Err(e) => break Err(e.into()),
                    };
                    // Connection closed
                    if n == 0 {
                        if framer.is_mid_frame() {
                            debug!("Client left in the middle of a frame");
                        }
                        break Ok(());
                    }
                    debug!("Read {} bytes", n);

                    let frames = match framer.feed(&read_buffer) {
                        Ok(frames) => frames,
                        Err(e) => {
                            warn!("{}", e);
                            outbox.push(RespValue::error(format!("ERR {}", e)));
                            if let Err(io) = flush(&mut writer, &outbox).await {
                                break Err(io.into());
                            }
                            break Err(e.into());
                        }
                    };
                    if frames.is_empty() {
                        continue;
                    }

                    let Some(current) = session.take() else {
                        break Ok(());
                    };
                    let (current, quitting) = match execute(current, frames, Arc::clone(&outbox)).await {
                        Ok(done) => done,
                        Err(e) => break Err(e.into()),
                    };
                    session = Some(current);

                    if let Err(e) = flush(&mut writer, &outbox).await {
                        break Err(e.into());
                    }
                    if quitting {
                        break Ok(());
                    }
                }
                _ = outbox.notified() => {
                    if let Err(e) = flush(&mut writer, &outbox).await {
                        break Err(e.into());
                    }
                }
            }
        };

        if let Some(mut session) = session {
            session.close();
        }
        result
    }
}

/// Run a batch of frames off the async runtime; blocking commands may wait
/// on a condition variable
async fn execute(
    mut session: Session,
    frames: Vec<Vec<Bytes>>,
    outbox: Arc<Outbox>,
) -> Result<(Session, bool), tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        for frame in frames {
            let reply = session.execute(frame);
            if !matches!(reply, RespValue::NoReply) {
                outbox.push(reply);
            }
            if session.is_quitting() {
                return (session, true);
            }
        }
        (session, false)
    })
    .await
}

/// Write everything queued on the outbox
async fn flush<S>(writer: &mut WriteHalf<S>, outbox: &Outbox) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pending = outbox.drain();
    if pending.is_empty() {
        return Ok(());
    }
    let mut buf = BytesMut::new();
    for value in &pending {
        RespEncoder::encode_to(&mut buf, value);
    }
    writer.write_all(&buf).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use tokio_test::io::Builder;

    fn server() -> Arc<Server> {
        Server::new(ServerConfig::default())
    }

    #[tokio::test]
    async fn test_ping() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        Connection::new(mock).handle(server()).await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .write(b"+OK\r\n$1\r\nv\r\n")
            .build();
        Connection::new(mock).handle(server()).await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let mock = Builder::new()
            .read(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel")
            .read(b"lo\r\n")
            .write(b"$5\r\nhello\r\n")
            .build();
        Connection::new(mock).handle(server()).await.unwrap();
    }

    #[tokio::test]
    async fn test_protocol_error_closes() {
        let mock = Builder::new()
            .read(b"+PING\r\n")
            .write(b"-ERR Protocol error: expected '*', got '+'\r\n")
            .build();
        assert!(Connection::new(mock).handle(server()).await.is_err());
    }

    #[tokio::test]
    async fn test_quit_stops_reading() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nQUIT\r\n")
            .write(b"+OK\r\n")
            .build();
        Connection::new(mock).handle(server()).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_confirmation() {
        let mock = Builder::new()
            .read(b"*2\r\n$9\r\nSUBSCRIBE\r\n$2\r\nch\r\n")
            .write(b"*3\r\n$9\r\nsubscribe\r\n$2\r\nch\r\n:1\r\n")
            .build();
        let server = server();
        Connection::new(mock).handle(Arc::clone(&server)).await.unwrap();
        // the session was unregistered on exit
        let mut other = server.session();
        assert_eq!(
            other.execute(vec![Bytes::from("PUBLISH"), Bytes::from("ch"), Bytes::from("x")]),
            RespValue::integer(0)
        );
    }
}
