//! Shared application state
//!
//! Holds the handles every connection shares: the completions client and
//! the upload store. Conversation state never lives here; each session
//! owns its own transcript.

use crate::llm::CompletionsClient;
use crate::services::uploads::UploadStore;

/// Handles shared by all connections
pub struct AppState {
    /// Client for the streaming completions API
    pub completions: CompletionsClient,
    /// Store for client-uploaded attachments
    pub uploads: UploadStore,
}

impl AppState {
    /// Bundle the shared handles
    pub fn new(completions: CompletionsClient, uploads: UploadStore) -> Self {
        Self {
            completions,
            uploads,
        }
    }
}
