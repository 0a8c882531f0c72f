//! Connection handle definition
//!
//! Represents one active transport session: its identity, display address,
//! outbound queue and close signal.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::types::ConnectionId;

/// Handle to an active connection
///
/// Cheap to clone. The transport owns the receiving half of the outbound
/// queue; the registry keeps a clone of the handle while the connection is
/// a member.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Remote address in display form
    pub addr: String,
    /// Server → Client line queue
    sender: mpsc::UnboundedSender<String>,
    /// Cancelled once the connection is closed
    closed: CancellationToken,
}

impl Connection {
    /// Create a new connection handle for the given remote address
    ///
    /// Returns the handle and the receiving half of its outbound queue.
    pub fn new(addr: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let conn = Self {
            id: ConnectionId::new(),
            addr: addr.into(),
            sender,
            closed: CancellationToken::new(),
        };
        (conn, receiver)
    }

    /// Queue a line for this connection without waiting for delivery
    ///
    /// Returns an error if the writer side is gone (client disconnected).
    pub fn send(&self, line: String) -> Result<(), SendError> {
        self.sender.send(line).map_err(|_| SendError::ChannelClosed)
    }

    /// Close the connection; idempotent
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Check whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token the transport waits on to learn about closes
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_creation() {
        let (conn, _rx) = Connection::new("127.0.0.1:4000");

        assert_eq!(conn.addr, "127.0.0.1:4000");
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_connection_send() {
        let (conn, mut rx) = Connection::new("127.0.0.1:4000");

        conn.send("hello".to_string()).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (conn, rx) = Connection::new("127.0.0.1:4000");
        drop(rx);

        assert!(matches!(
            conn.send("lost".to_string()),
            Err(SendError::ChannelClosed)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (conn, _rx) = Connection::new("127.0.0.1:4000");
        let token = conn.close_token();

        conn.close();
        conn.close();

        assert!(conn.is_closed());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_identity() {
        let (conn, _rx) = Connection::new("127.0.0.1:4000");
        let other = conn.clone();

        assert_eq!(conn.id, other.id);
        other.close();
        assert!(conn.is_closed());
    }
}
