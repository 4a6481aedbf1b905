//! Chat module
//!
//! Wire protocol models and the per-connection session bridge.

pub mod models;
pub mod session;

pub use models::{Attachment, ChatMessage, ClientMessage, MessageRole, ProtocolError, ServerEvent};
pub use session::ChatSession;
