//! Chat message model and wire codec interface
//!
//! A chat line is broadcast in two renderings: an echo back to its author
//! and a relay (tagged with the author's address) to everyone else. How
//! those renderings look on the wire is up to the `ChatCodec` in use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{JsonCodec, LegacyCodec};
use crate::error::AppError;

/// Chat message as seen by one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatMessage {
    /// The line as echoed to its own author
    #[serde(rename = "self")]
    Echo { body: String },
    /// The line as relayed to another participant
    #[serde(rename = "peer")]
    Relay { address: String, body: String },
}

impl ChatMessage {
    /// Message body regardless of kind
    pub fn body(&self) -> &str {
        match self {
            ChatMessage::Echo { body } | ChatMessage::Relay { body, .. } => body,
        }
    }
}

/// Result of decoding one inbound line on the client side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A well-formed chat message
    Chat(ChatMessage),
    /// Anything else (system announcements, legacy or malformed lines),
    /// displayed as-is
    Raw(String),
}

/// Encoder/decoder for chat messages
///
/// Session and registry logic only ever talk to this trait, so the wire
/// format can be swapped without touching them.
pub trait ChatCodec: Send + Sync {
    /// Encode a message into a single line (without terminator)
    fn encode(&self, message: &ChatMessage) -> Result<String, AppError>;

    /// Decode a received line
    ///
    /// Returns None for lines that should not be displayed at all.
    fn decode(&self, line: &str) -> Option<Inbound>;
}

/// Selectable wire format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// `%%d`-separated fields
    #[default]
    Legacy,
    /// One JSON object per line
    Json,
}

/// Room on the wire for the envelope around a body: kind tag, separators
/// or JSON keys, and the sender address
const ENVELOPE_ALLOWANCE: usize = 128;

impl WireFormat {
    /// Look up a format by its command line name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "legacy" => Some(WireFormat::Legacy),
            "json" => Some(WireFormat::Json),
            _ => None,
        }
    }

    /// Longest line a server capping bodies at `max_body` bytes can emit
    ///
    /// JSON may escape a single byte as `\u00XX`.
    pub fn max_encoded_len(self, max_body: usize) -> usize {
        match self {
            WireFormat::Legacy => max_body + ENVELOPE_ALLOWANCE,
            WireFormat::Json => max_body.saturating_mul(6) + ENVELOPE_ALLOWANCE,
        }
    }

    /// Build the codec for this format
    pub fn codec(self) -> Arc<dyn ChatCodec> {
        match self {
            WireFormat::Legacy => Arc::new(LegacyCodec),
            WireFormat::Json => Arc::new(JsonCodec),
        }
    }
}

/// System line announcing a new participant
pub fn join_announcement(addr: &str) -> String {
    format!("[SERVER] - {} joined", addr)
}

/// System line announcing a departed participant
pub fn leave_announcement(addr: &str) -> String {
    format!("[SERVER] - {} left", addr)
}
