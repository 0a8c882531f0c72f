//! TCP line transport
//!
//! Frames a socket into text lines, spawns the writer task that drains the
//! connection's outbound queue, and feeds lifecycle events to a `Session`.

use bytes::{BufMut, BytesMut};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::registry::RegistryHandle;
use crate::session::{ChatSession, Session};

/// Default hard cap on a single line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Line codec: accepts `\n` or `\r\n` inbound, always writes `\r\n`
///
/// The length cap applies to the line without its terminator. Invalid UTF-8
/// is replaced rather than rejected. A strict codec fails on an oversized
/// line; a lenient one drops it and carries on with the next line.
#[derive(Debug, Clone)]
pub struct ChatLineCodec {
    max_length: usize,
    lenient: bool,
    /// Bytes already searched for a newline
    next_index: usize,
    /// Skipping the rest of an oversized line
    discarding: bool,
}

impl ChatLineCodec {
    /// Create a codec rejecting lines longer than `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            lenient: false,
            next_index: 0,
            discarding: false,
        }
    }

    /// Create a codec that skips lines longer than `max_length` bytes
    pub fn lenient(max_length: usize) -> Self {
        Self {
            lenient: true,
            ..Self::new(max_length)
        }
    }

    /// Longest accepted line, terminator excluded
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn oversized(&mut self) -> Result<(), LinesCodecError> {
        if self.lenient {
            warn!("Dropping line longer than {} bytes", self.max_length);
            Ok(())
        } else {
            Err(LinesCodecError::MaxLineLengthExceeded)
        }
    }
}

impl Default for ChatLineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

fn without_carriage_return(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Decoder for ChatLineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        loop {
            let newline = buf[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if self.discarding {
                    buf.clear();
                    self.next_index = 0;
                } else if buf.len() > self.max_length + 1 {
                    // Room for a full line plus a pending '\r'
                    self.oversized()?;
                    self.discarding = true;
                    buf.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let frame = buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let line = without_carriage_return(&frame[..frame.len() - 1]);
            if line.len() > self.max_length {
                self.oversized()?;
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() || self.discarding {
            buf.clear();
            self.next_index = 0;
            return Ok(None);
        }

        let frame = buf.split_to(buf.len());
        self.next_index = 0;
        let line = without_carriage_return(&frame);
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

impl Encoder<String> for ChatLineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        buf.reserve(line.len() + 2);
        buf.put(line.as_bytes());
        buf.put(&b"\r\n"[..]);
        Ok(())
    }
}

/// Handle a new TCP connection
///
/// Registers a `ChatSession` with the registry and runs it until the peer
/// disconnects, the transport fails, or the connection is closed.
pub async fn handle_connection(
    stream: TcpStream,
    registry: RegistryHandle,
    max_line_length: usize,
) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?.to_string();

    debug!("New TCP connection from {}", peer_addr);

    let (reader, writer) = stream.into_split();
    let (conn, outbound) = Connection::new(peer_addr);
    let closed = conn.close_token();

    let write_task = tokio::spawn(write_lines(
        FramedWrite::new(writer, ChatLineCodec::new(max_line_length)),
        outbound,
        closed.clone(),
    ));

    let mut session = ChatSession::new(conn, registry);
    let mut lines = FramedRead::new(reader, ChatLineCodec::new(max_line_length));
    drive_session(&mut session, &mut lines, closed).await;

    // The session closed the token; let the writer wind down
    write_task.await?;

    Ok(())
}

/// Feed transport events to a session until the connection ends
pub async fn drive_session<S, L>(session: &mut S, lines: &mut L, closed: CancellationToken)
where
    S: Session,
    L: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    session.on_active();

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                session.on_inactive();
                break;
            }
            frame = lines.next() => match frame {
                Some(Ok(line)) => session.on_line(line),
                Some(Err(e)) => {
                    session.on_error(&AppError::from(e));
                    break;
                }
                None => {
                    session.on_inactive();
                    break;
                }
            }
        }
    }
}

/// Drain the outbound queue into the socket
///
/// Ends when the connection is closed or the socket fails; a socket failure
/// closes the connection so the reader side notices.
async fn write_lines<W>(
    mut sink: FramedWrite<W, ChatLineCodec>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            line = outbound.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = sink.send(line).await {
                    debug!("Write failed, closing connection: {}", e);
                    closed.cancel();
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
    debug!("Write task ended");
}
