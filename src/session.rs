//! Per-connection session logic
//!
//! The transport drives a `Session` through its lifecycle callbacks;
//! `ChatSession` is the chat implementation that ties one connection to an
//! injected registry.

use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::registry::RegistryHandle;

/// Lifecycle callbacks raised by the transport for one connection
///
/// Callbacks are invoked sequentially from the connection's own task.
pub trait Session: Send {
    /// The connection is established
    fn on_active(&mut self);
    /// A complete line arrived (terminator already stripped)
    fn on_line(&mut self, line: String);
    /// The peer disconnected
    fn on_inactive(&mut self);
    /// The transport failed
    fn on_error(&mut self, error: &AppError);
}

/// Session state machine: Connecting -> Active -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Chat session bound to one connection
pub struct ChatSession {
    conn: Connection,
    registry: RegistryHandle,
    state: SessionState,
}

impl ChatSession {
    /// Create a session for the given connection and registry
    pub fn new(conn: Connection, registry: RegistryHandle) -> Self {
        Self {
            conn,
            registry,
            state: SessionState::Connecting,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle of the connection this session serves
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Move to Closed, deregister and close the transport
    fn close(&mut self) {
        self.state = SessionState::Closed;
        if let Err(e) = self.registry.remove(self.conn.id) {
            warn!("Failed to deregister {}: {}", self.conn.addr, e);
        }
        self.conn.close();
    }
}

impl Session for ChatSession {
    fn on_active(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }

        info!("{} online", self.conn.addr);
        match self.registry.add(self.conn.clone()) {
            Ok(()) => self.state = SessionState::Active,
            Err(e) => {
                warn!("Failed to register {}: {}", self.conn.addr, e);
                self.state = SessionState::Closed;
                self.conn.close();
            }
        }
    }

    fn on_line(&mut self, line: String) {
        if self.state != SessionState::Active {
            debug!("Ignoring line from {} in state {:?}", self.conn.addr, self.state);
            return;
        }
        if line.is_empty() {
            return;
        }

        if let Err(e) = self.registry.broadcast(&self.conn, line) {
            warn!("Failed to broadcast from {}: {}", self.conn.addr, e);
        }
    }

    fn on_inactive(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        info!("{} offline", self.conn.addr);
        self.close();
    }

    fn on_error(&mut self, error: &AppError) {
        warn!("{} error: {}", self.conn.addr, error);
        if self.state == SessionState::Closed {
            return;
        }

        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::codec::LegacyCodec;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn connect(
        registry: &RegistryHandle,
        addr: &str,
    ) -> (ChatSession, mpsc::UnboundedReceiver<String>) {
        let (conn, rx) = Connection::new(addr);
        let mut session = ChatSession::new(conn, registry.clone());
        session.on_active();
        (session, rx)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (conn, _rx) = Connection::new("10.0.0.1:1000");
        let mut session = ChatSession::new(conn, registry.clone());

        assert_eq!(session.state(), SessionState::Connecting);

        session.on_active();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(registry.len().await.unwrap(), 1);

        session.on_inactive();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.connection().is_closed());
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chat_scenario() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (mut a, mut a_rx) = connect(&registry, "10.0.0.1:1000");
        let (mut b, mut b_rx) = connect(&registry, "10.0.0.2:2000");
        registry.len().await.unwrap();

        assert_eq!(drain(&mut a_rx), vec!["[SERVER] - 10.0.0.2:2000 joined"]);
        assert!(drain(&mut b_rx).is_empty());

        a.on_line("hi".to_string());
        registry.len().await.unwrap();

        assert_eq!(drain(&mut a_rx), vec!["%%dme%%dhi"]);
        assert_eq!(drain(&mut b_rx), vec!["%%dip%%d10.0.0.1:1000%%dhi"]);

        b.on_inactive();
        a.on_line("anyone?".to_string());
        assert_eq!(registry.len().await.unwrap(), 1);

        assert_eq!(
            drain(&mut a_rx),
            vec!["[SERVER] - 10.0.0.2:2000 left", "%%dme%%danyone?"]
        );
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn test_empty_line_is_dropped() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (mut a, mut a_rx) = connect(&registry, "10.0.0.1:1000");
        let (_b, mut b_rx) = connect(&registry, "10.0.0.2:2000");
        registry.len().await.unwrap();
        drain(&mut a_rx);

        a.on_line(String::new());
        registry.len().await.unwrap();

        assert!(drain(&mut a_rx).is_empty());
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn test_error_after_disconnect_announces_once() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (_a, mut a_rx) = connect(&registry, "10.0.0.1:1000");
        let (mut b, _b_rx) = connect(&registry, "10.0.0.2:2000");
        registry.len().await.unwrap();
        drain(&mut a_rx);

        b.on_inactive();
        b.on_error(&AppError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )));
        assert_eq!(registry.len().await.unwrap(), 1);

        assert_eq!(drain(&mut a_rx), vec!["[SERVER] - 10.0.0.2:2000 left"]);
    }

    #[tokio::test]
    async fn test_error_closes_session() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (mut a, _a_rx) = connect(&registry, "10.0.0.1:1000");

        a.on_error(&AppError::Io(std::io::Error::from(
            std::io::ErrorKind::BrokenPipe,
        )));

        assert_eq!(a.state(), SessionState::Closed);
        assert!(a.connection().is_closed());
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_session_ignores_lines() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let (mut a, mut a_rx) = connect(&registry, "10.0.0.1:1000");
        let (_b, mut b_rx) = connect(&registry, "10.0.0.2:2000");

        a.on_inactive();
        a.on_line("ghost".to_string());
        registry.len().await.unwrap();

        assert!(drain(&mut a_rx).iter().all(|line| !line.contains("ghost")));
        assert_eq!(drain(&mut b_rx), vec!["[SERVER] - 10.0.0.1:1000 left"]);
    }

    #[tokio::test]
    async fn test_membership_tracks_active_sessions() {
        let registry = RegistryHandle::spawn(Arc::new(LegacyCodec));
        let mut sessions = Vec::new();

        for i in 0..10 {
            sessions.push(connect(&registry, &format!("10.0.0.{}:1000", i)));
            assert_eq!(registry.len().await.unwrap(), i + 1);
        }

        for (i, (session, _rx)) in sessions.iter_mut().enumerate() {
            session.on_inactive();
            assert_eq!(registry.len().await.unwrap(), 10 - i - 1);
        }
    }

    #[tokio::test]
    async fn test_register_fails_when_registry_gone() {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let (conn, _rx) = Connection::new("10.0.0.1:1000");
        let mut session = ChatSession::new(conn, RegistryHandle::new(sender));

        session.on_active();

        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.connection().is_closed());
    }
}
