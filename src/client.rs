//! Terminal chat client
//!
//! Connects to a server, sends stdin lines and prints decoded broadcasts,
//! marking the user's own messages apart from everyone else's.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::handler::ChatLineCodec;
use crate::message::{ChatMessage, Inbound, WireFormat};

/// Line that ends the client without being sent
pub const EXIT_COMMAND: &str = "exit";

/// What to do with one line of user input
#[derive(Debug, PartialEq, Eq)]
pub enum InputAction<'a> {
    /// Send the line verbatim
    Send(&'a str),
    /// Nothing to send (empty input)
    Skip,
    /// Leave the chat
    Exit,
}

/// Classify a stdin line
///
/// Empty lines are suppressed rather than sent.
pub fn classify_input(line: &str) -> InputAction<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line == EXIT_COMMAND {
        InputAction::Exit
    } else if line.is_empty() {
        InputAction::Skip
    } else {
        InputAction::Send(line)
    }
}

/// Render a decoded line for the terminal
pub fn render(inbound: &Inbound) -> String {
    match inbound {
        Inbound::Chat(ChatMessage::Echo { body }) => format!("[me] {}", body),
        Inbound::Chat(ChatMessage::Relay { address, body }) => format!("[{}] {}", address, body),
        Inbound::Raw(line) => line.clone(),
    }
}

/// Codec for lines coming from the server
///
/// Broadcasts carry an envelope on top of a body the server already capped,
/// so the read cap is widened to fit it. Anything longer is skipped rather
/// than ending the session.
pub fn incoming_codec(protocol: WireFormat, max_line_length: usize) -> ChatLineCodec {
    ChatLineCodec::lenient(protocol.max_encoded_len(max_line_length))
}

/// Run the client until `exit`, end of stdin, or the server hangs up
pub async fn run(config: ClientConfig) -> Result<(), AppError> {
    let stream = TcpStream::connect(config.server).await?;
    info!("Connected to {}", config.server);

    let codec = config.protocol.codec();
    let (reader, writer) = stream.into_split();
    let mut incoming = FramedRead::new(
        reader,
        incoming_codec(config.protocol, config.max_line_length),
    );
    let mut outgoing = FramedWrite::new(writer, ChatLineCodec::new(config.max_line_length));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(line)) => {
                    if let Some(inbound) = codec.decode(&line) {
                        write_stdout(&render(&inbound)).await?;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    write_stdout("*** server closed the connection").await?;
                    break;
                }
            },
            input = stdin.next_line() => {
                let Some(input) = input? else { break };
                match classify_input(&input) {
                    InputAction::Send(line) => outgoing.send(line.to_string()).await?,
                    InputAction::Skip => debug!("Skipping empty input"),
                    InputAction::Exit => {
                        write_stdout("*** leaving chat").await?;
                        break;
                    }
                }
            }
        }
    }

    outgoing.close().await?;
    Ok(())
}

async fn write_stdout(line: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_input() {
        assert_eq!(classify_input("exit"), InputAction::Exit);
        assert_eq!(classify_input("exit\r"), InputAction::Exit);
        assert_eq!(classify_input(""), InputAction::Skip);
        assert_eq!(classify_input("hello"), InputAction::Send("hello"));
        assert_eq!(classify_input(" exit "), InputAction::Send(" exit "));
    }

    #[test]
    fn test_render_own_and_peer() {
        let own = Inbound::Chat(ChatMessage::Echo {
            body: "hi".to_string(),
        });
        let peer = Inbound::Chat(ChatMessage::Relay {
            address: "10.0.0.2:2000".to_string(),
            body: "hi".to_string(),
        });

        assert_eq!(render(&own), "[me] hi");
        assert_eq!(render(&peer), "[10.0.0.2:2000] hi");
    }

    #[test]
    fn test_incoming_codec_fits_full_size_relay() {
        use bytes::BytesMut;
        use tokio_util::codec::Decoder;

        let line = format!("%%dip%%d[::1]:65535%%d{}\r\nnext\r\n", "x".repeat(8192));
        let mut buf = BytesMut::from(line.as_bytes());
        let mut codec = incoming_codec(WireFormat::Legacy, 8192);

        let relay = codec.decode(&mut buf).unwrap().unwrap();
        assert!(relay.ends_with(&"x".repeat(8192)));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn test_render_raw() {
        let raw = Inbound::Raw("[SERVER] - 10.0.0.2:2000 joined".to_string());
        assert_eq!(render(&raw), "[SERVER] - 10.0.0.2:2000 joined");
    }
}
