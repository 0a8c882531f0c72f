//! Connection registry actor
//!
//! The single owner of the membership set. Sessions talk to it through a
//! cloneable `RegistryHandle`; every add, remove and broadcast is processed
//! in arrival order by one task, so membership changes and broadcast
//! iteration never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::{join_announcement, leave_announcement, ChatCodec, ChatMessage};
use crate::types::ConnectionId;

/// Commands sent from sessions to the registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Connection became active
    Add { conn: Connection },
    /// Connection went away
    Remove { id: ConnectionId },
    /// Chat line received from a connection
    Broadcast {
        origin: ConnectionId,
        origin_addr: String,
        line: String,
    },
    /// Report the current membership size
    Len { reply: oneshot::Sender<usize> },
}

/// The registry actor
///
/// Holds non-owning clones of every active connection handle.
pub struct Registry {
    /// Active connections: ConnectionId -> Connection
    members: HashMap<ConnectionId, Connection>,
    /// Wire encoding for chat messages
    codec: Arc<dyn ChatCodec>,
    /// Command receiver channel
    receiver: mpsc::UnboundedReceiver<RegistryCommand>,
}

impl Registry {
    /// Create a new registry with the given command receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<RegistryCommand>, codec: Arc<dyn ChatCodec>) -> Self {
        Self {
            members: HashMap::new(),
            codec,
            receiver,
        }
    }

    /// Run the registry event loop
    ///
    /// Processes commands until every handle has been dropped.
    pub async fn run(mut self) {
        info!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Registry shutting down");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { conn } => self.handle_add(conn),
            RegistryCommand::Remove { id } => self.handle_remove(id),
            RegistryCommand::Broadcast {
                origin,
                origin_addr,
                line,
            } => self.handle_broadcast(origin, origin_addr, line),
            RegistryCommand::Len { reply } => {
                let _ = reply.send(self.members.len());
            }
        }
    }

    /// Announce the newcomer to everyone already present, then register it
    fn handle_add(&mut self, conn: Connection) {
        if self.members.contains_key(&conn.id) {
            warn!("Connection {} registered twice", conn.id);
            return;
        }

        let announcement = join_announcement(&conn.addr);
        self.send_to_all(&announcement);

        info!("Connection {} ({}) joined", conn.id, conn.addr);
        self.members.insert(conn.id, conn);
        debug!("Total connections: {}", self.members.len());
    }

    /// Deregister and announce the departure; absent ids are ignored
    fn handle_remove(&mut self, id: ConnectionId) {
        let Some(conn) = self.members.remove(&id) else {
            debug!("Connection {} already removed", id);
            return;
        };

        info!("Connection {} ({}) left", conn.id, conn.addr);
        let announcement = leave_announcement(&conn.addr);
        self.send_to_all(&announcement);
        debug!("Total connections: {}", self.members.len());
    }

    /// Echo to the origin (if still a member), relay to everyone else
    fn handle_broadcast(&mut self, origin: ConnectionId, origin_addr: String, line: String) {
        if line.is_empty() {
            return;
        }

        let relay = ChatMessage::Relay {
            address: origin_addr,
            body: line.clone(),
        };
        debug!(
            "Broadcasting {} bytes from {} to {} connections",
            relay.body().len(),
            origin,
            self.members.len()
        );

        let echo = self.codec.encode(&ChatMessage::Echo { body: line });
        let relay = self.codec.encode(&relay);
        let (echo, relay) = match (echo, relay) {
            (Ok(echo), Ok(relay)) => (echo, relay),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to encode message from {}: {}", origin, e);
                return;
            }
        };

        for (id, conn) in &self.members {
            let encoded = if *id == origin { &echo } else { &relay };
            deliver(conn, encoded);
        }
    }

    fn send_to_all(&self, line: &str) {
        for conn in self.members.values() {
            deliver(conn, line);
        }
    }
}

/// Best-effort send; closed or failing connections are skipped
fn deliver(conn: &Connection, line: &str) {
    if conn.is_closed() {
        debug!("Skipping closed connection {}", conn.id);
        return;
    }
    if let Err(e) = conn.send(line.to_string()) {
        debug!("Dropped line to {}: {}", conn.id, e);
    }
}

/// Cloneable handle used by sessions to reach the registry
///
/// Each handle belongs to one explicitly created registry; there is no
/// process-wide instance.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::UnboundedSender<RegistryCommand>,
}

impl RegistryHandle {
    /// Wrap an existing command sender
    pub fn new(sender: mpsc::UnboundedSender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Create a registry with the given codec and spawn its actor task
    pub fn spawn(codec: Arc<dyn ChatCodec>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Registry::new(receiver, codec).run());
        Self::new(sender)
    }

    /// Register a newly active connection
    pub fn add(&self, conn: Connection) -> Result<(), AppError> {
        self.send(RegistryCommand::Add { conn })
    }

    /// Deregister a connection; removing an absent one is a no-op
    pub fn remove(&self, id: ConnectionId) -> Result<(), AppError> {
        self.send(RegistryCommand::Remove { id })
    }

    /// Broadcast a chat line from the given connection
    pub fn broadcast(&self, origin: &Connection, line: String) -> Result<(), AppError> {
        self.send(RegistryCommand::Broadcast {
            origin: origin.id,
            origin_addr: origin.addr.clone(),
            line,
        })
    }

    /// Current membership size
    ///
    /// Resolves after every command sent before it has been processed.
    pub async fn len(&self) -> Result<usize, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Len { reply })?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    fn send(&self, cmd: RegistryCommand) -> Result<(), AppError> {
        self.sender.send(cmd).map_err(|_| AppError::RegistryClosed)
    }
}
