//! Stream frame parsing and the outbound bridge message.
//!
//! Inbound frames look like
//! `{"type": "update", "payload": {"data": {"body": "...", "author": "..."}}}`.
//! Other frame types (`activity`, `settings`, `delete`, ...) carry payloads of
//! other shapes, so frames are decoded loosely through [`serde_json::Value`]
//! rather than a fixed struct.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FrameError;

/// Frame type that carries a new thread entry.
pub const UPDATE: &str = "update";

/// One decoded stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Wire `type`; empty when the frame has none.
    pub kind: String,
    pub author: Option<String>,
    /// `payload.data.body`; empty when absent or not a string.
    pub body: String,
}

impl InboundEvent {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let frame: Value = serde_json::from_str(text)?;
        let str_at = |pointer: &str| frame.pointer(pointer).and_then(Value::as_str).map(str::to_owned);

        Ok(Self {
            kind: str_at("/type").unwrap_or_default(),
            author: str_at("/payload/data/author"),
            body: str_at("/payload/data/body").unwrap_or_default(),
        })
    }

    /// Decode a binary frame, which some servers use for JSON text.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FrameError::Utf8)?;
        Self::parse(text)
    }

    pub fn is_forwardable(&self) -> bool {
        self.kind == UPDATE && !self.body.is_empty()
    }

    /// Convert into a bridge message for `gateway`, or `None` when the event
    /// should not be forwarded.
    pub fn into_outbound(self, gateway: &str) -> Option<OutboundMessage> {
        if !self.is_forwardable() {
            return None;
        }
        Some(OutboundMessage {
            gateway: gateway.to_string(),
            text: self.body,
            username: self.author,
        })
    }
}

/// Body of `POST {apiBase}/api/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub gateway: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
