//! Wire codecs for chat messages
//!
//! - `LegacyCodec`: fields joined by the `%%d` separator, kept byte-for-byte
//!   compatible with existing clients.
//! - `JsonCodec`: one serde-tagged JSON object per line.
//!
//! The legacy format has no escaping: a body containing `%%d` is cut short
//! when decoded.

use crate::error::AppError;
use crate::message::{ChatCodec, ChatMessage, Inbound};

/// Field separator of the legacy format
pub const SEPARATOR: &str = "%%d";

const KIND_ECHO: &str = "me";
const KIND_RELAY: &str = "ip";

/// `%%d`-separated codec
///
/// `%%dme%%d{body}` for echoes, `%%dip%%d{address}%%d{body}` for relays.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCodec;

impl ChatCodec for LegacyCodec {
    fn encode(&self, message: &ChatMessage) -> Result<String, AppError> {
        let line = match message {
            ChatMessage::Echo { body } => {
                format!("{SEPARATOR}{KIND_ECHO}{SEPARATOR}{body}")
            }
            ChatMessage::Relay { address, body } => {
                format!("{SEPARATOR}{KIND_RELAY}{SEPARATOR}{address}{SEPARATOR}{body}")
            }
        };
        Ok(line)
    }

    fn decode(&self, line: &str) -> Option<Inbound> {
        if line.is_empty() {
            return None;
        }

        let fields: Vec<&str> = line.split(SEPARATOR).collect();

        // A leading separator marks a protocol message
        if !fields[0].is_empty() {
            return Some(Inbound::Raw(line.to_string()));
        }

        let message = match (fields.get(1).map(|kind| kind.trim()), fields.len()) {
            (Some(KIND_ECHO), n) if n >= 3 => ChatMessage::Echo {
                body: fields[2].to_string(),
            },
            (Some(KIND_RELAY), n) if n >= 4 => ChatMessage::Relay {
                address: fields[2].to_string(),
                body: fields[3].to_string(),
            },
            _ => return Some(Inbound::Raw(line.to_string())),
        };

        Some(Inbound::Chat(message))
    }
}

/// JSON-lines codec
///
/// `{"kind":"self","body":..}` or `{"kind":"peer","address":..,"body":..}`.
/// Lines that are not valid messages decode as raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ChatCodec for JsonCodec {
    fn encode(&self, message: &ChatMessage) -> Result<String, AppError> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(&self, line: &str) -> Option<Inbound> {
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<ChatMessage>(line) {
            Ok(message) => Some(Inbound::Chat(message)),
            Err(_) => Some(Inbound::Raw(line.to_string())),
        }
    }
}
