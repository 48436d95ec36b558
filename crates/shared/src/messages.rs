//! WebSocket message types for live generation sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw client frame as it arrives on the socket.
///
/// The `type` field is overloaded: it names the content type for a
/// generation request, or `ping` for a keep-alive.
#[derive(Debug, Clone, Default, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    prompt: Option<String>,
    title: Option<String>,
    #[serde(alias = "campaignId")]
    campaign_id: Option<Uuid>,
    #[serde(alias = "contentId")]
    content_id: Option<Uuid>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Messages from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Keep-alive, answered with `Pong`
    Ping,
    /// Request to generate a piece of content
    Generate(GenerateContent),
}

/// Generation request payload.
///
/// Fields are optional on the wire; required-field validation happens in the
/// engine so the session receives a proper `error` message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateContent {
    pub content_type: Option<String>,
    pub prompt: Option<String>,
    pub title: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub content_id: Option<Uuid>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if frame.kind.as_deref() == Some("ping") {
            return Ok(ClientMessage::Ping);
        }

        Ok(ClientMessage::Generate(GenerateContent {
            content_type: frame.kind,
            prompt: frame.prompt,
            title: frame.title,
            campaign_id: frame.campaign_id,
            content_id: frame.content_id,
            metadata: frame.metadata,
        }))
    }
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session admitted
    Connected { message: String },
    /// A content record was created; subsequent chunks belong to it
    Started { content_id: Uuid },
    /// One generated text fragment, verbatim
    Chunk { content: String },
    /// Generation finished and the body was persisted
    Complete { content_id: Uuid },
    /// Human-readable failure
    Error { message: String },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    Malformed(String),
}
