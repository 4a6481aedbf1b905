//! Chat data models
//!
//! Defines the transcript entry shape sent to the completions API and the
//! tagged wire messages exchanged with WebSocket clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant/AI
    Assistant,
}

impl MessageRole {
    /// Convert the role to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// A single transcript entry
///
/// This is the exact shape serialized into the `messages` array of every
/// upstream request. Control messages never become transcript entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new transcript entry
    pub fn new(role: MessageRole, content: String) -> Self {
        Self { role, content }
    }
}

/// File payload carried by an inbound upload message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    /// Declared file name, used as the storage key
    pub name: String,
    /// Raw file bytes represented as text
    pub content: String,
    /// Declared media type of the file
    #[serde(rename = "type", default)]
    pub media_type: String,
}

/// Errors raised while decoding an inbound client frame
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not valid JSON for the inbound message shape
    #[error("malformed client frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A text payload arrived without a role
    #[error("client message is missing a role")]
    MissingRole,
    /// A file message arrived without a usable payload
    #[error("file payload must carry a non-empty name and content")]
    InvalidFile,
}

/// Raw inbound frame, decoded before any discriminator checks.
///
/// Wire shape: `{ content, role, type?, file? }`.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    content: String,
    #[serde(default)]
    role: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    file: Option<Attachment>,
}

/// A decoded inbound client message
///
/// The `type` discriminator is checked before any variant field is touched,
/// so each variant carries exactly the fields its kind is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Plain chat text
    Text {
        /// Role declared by the client
        role: MessageRole,
        /// Message text
        content: String,
    },
    /// File transfer
    FileUpload {
        /// Role declared by the client
        role: MessageRole,
        /// Text content accompanying the upload, usually empty
        content: String,
        /// The file payload to persist
        attachment: Attachment,
    },
}

impl ClientMessage {
    /// Decode one inbound frame.
    ///
    /// A text payload must declare a role; a file payload must additionally
    /// carry a non-empty name and content.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let frame: InboundFrame = serde_json::from_str(raw)?;
        if frame.role.is_empty() {
            return Err(ProtocolError::MissingRole);
        }
        let role = MessageRole::from(frame.role.as_str());

        match frame.kind.as_deref() {
            Some("file") => {
                let attachment = frame.file.ok_or(ProtocolError::InvalidFile)?;
                if attachment.name.is_empty() || attachment.content.is_empty() {
                    return Err(ProtocolError::InvalidFile);
                }
                Ok(ClientMessage::FileUpload {
                    role,
                    content: frame.content,
                    attachment,
                })
            }
            _ => Ok(ClientMessage::Text {
                role,
                content: frame.content,
            }),
        }
    }
}

/// An outbound wire message, discriminated by its `type` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A streamed reply is about to begin
    StreamStart,
    /// One incremental fragment of the reply
    StreamContent {
        /// Fragment text, exactly as produced by the decoder
        content: String,
        /// Always the assistant role
        role: MessageRole,
    },
    /// The streamed reply is complete
    StreamEnd,
}
