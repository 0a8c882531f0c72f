//! Line-based TCP Broadcast Chat Library
//!
//! A minimal chat service built with tokio: every line a client sends is
//! rebroadcast to all connected clients, echoed back to its author and
//! relayed to everyone else tagged with the author's address.
//!
//! # Architecture
//! - `Registry` is an actor owning the membership set; sessions reach it
//!   through a cloneable `RegistryHandle`, so no locks are needed
//! - Each connection runs a `ChatSession` driven by the line transport in
//!   `handler`, plus a writer task draining its outbound queue
//! - Wire encoding sits behind the `ChatCodec` trait (`%%d` legacy format
//!   or JSON lines)
//!
//! # Example
//! ```ignore
//! use tcp_chat::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::bind(&ServerConfig::default()).await.unwrap();
//!     server.run_until_ctrl_c().await;
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use codec::{JsonCodec, LegacyCodec};
pub use config::{ClientConfig, ServerConfig};
pub use connection::Connection;
pub use error::{AppError, SendError};
pub use handler::{handle_connection, ChatLineCodec};
pub use message::{ChatCodec, ChatMessage, Inbound, WireFormat};
pub use registry::{Registry, RegistryCommand, RegistryHandle};
pub use server::Server;
pub use session::{ChatSession, Session, SessionState};
pub use types::ConnectionId;
