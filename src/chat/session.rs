//! Chat session bridge
//!
//! One [`ChatSession`] owns a single WebSocket connection end to end: it
//! holds the conversation transcript, turns every inbound client message
//! into a streaming completions request, relays the reply fragment by
//! fragment, and appends the assembled reply to the transcript.
//!
//! Processing is strictly sequential. A new upstream request is never
//! dispatched before the previous turn has finalized; data frames that
//! arrive while a reply is streaming are queued and handled afterwards in
//! arrival order.

use crate::chat::models::{ChatMessage, ClientMessage, MessageRole, ServerEvent};
use crate::llm::stream::{decode_response, StreamFragment};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Template for the transcript notice that replaces a persisted upload.
const UPLOAD_NOTICE_PREFIX: &str = "Uploaded file: ";

/// Why a session loop stopped
#[derive(Error, Debug)]
pub enum SessionError {
    /// The peer closed the connection or the read half failed
    #[error("client connection closed")]
    Closed,
    /// Writing to the client socket failed; the connection is unusable
    #[error("failed to write to client socket: {0}")]
    Write(axum::Error),
    /// An outbound event could not be serialized
    #[error("failed to encode server event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-connection bridge between one WebSocket client and the completions
/// API
pub struct ChatSession {
    outbound: SplitSink<WebSocket, Message>,
    inbound: SplitStream<WebSocket>,
    /// Data frames read while a turn was streaming, kept in arrival order.
    pending: VecDeque<ClientMessage>,
    /// Conversation transcript, owned by this session alone.
    transcript: Vec<ChatMessage>,
    state: Arc<AppState>,
}

impl ChatSession {
    /// Create a session for a freshly upgraded socket
    pub fn new(socket: WebSocket, state: Arc<AppState>) -> Self {
        let (outbound, inbound) = socket.split();
        Self {
            outbound,
            inbound,
            pending: VecDeque::new(),
            transcript: Vec::new(),
            state,
        }
    }

    /// Drive the connection until the peer disconnects or a write fails.
    pub async fn run(mut self) {
        info!("Chat session started");
        while let Some(message) = self.next_message().await {
            if let Err(e) = self.handle_turn(message).await {
                match e {
                    SessionError::Closed => info!("Client disconnected mid-turn"),
                    other => error!(error = %other, "Session write failed"),
                }
                break;
            }
        }
        info!(
            transcript_len = self.transcript.len(),
            "Chat session ended"
        );
    }

    /// Next message to process: a frame queued during the previous turn, or
    /// the next data frame read from the socket. `None` ends the session.
    async fn next_message(&mut self) -> Option<ClientMessage> {
        if let Some(queued) = self.pending.pop_front() {
            return Some(queued);
        }
        loop {
            match self.inbound.next().await {
                Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        warn!(error = %e, "Closing connection on malformed client frame");
                        return None;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the connection");
                    return None;
                }
                // Ping, pong and binary frames carry no chat payload.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading client message");
                    return None;
                }
            }
        }
    }

    /// Run one full turn: ingest the message, dispatch the transcript,
    /// relay the streamed reply, and finalize the assistant entry.
    ///
    /// An upstream dispatch failure drops the turn before any notification
    /// is sent and leaves the session ready for the next message. Only
    /// client socket failures are fatal.
    async fn handle_turn(&mut self, message: ClientMessage) -> Result<(), SessionError> {
        let entry = self.ingest(message).await;
        debug!(
            role = entry.role.as_str(),
            content_len = entry.content.len(),
            "Transcript entry appended"
        );
        self.transcript.push(entry);

        let response = match self.state.completions.stream_chat(&self.transcript).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Upstream dispatch failed; dropping turn");
                return Ok(());
            }
        };

        self.send(&ServerEvent::StreamStart).await?;
        let reply = self.relay(decode_response(response)).await?;
        self.send(&ServerEvent::StreamEnd).await?;

        debug!(reply_len = reply.len(), "Turn complete");
        self.transcript
            .push(ChatMessage::new(MessageRole::Assistant, reply));
        Ok(())
    }

    /// Convert an inbound message into its transcript entry, persisting any
    /// attachment first.
    ///
    /// A storage failure is logged and the message content is kept
    /// unmodified; the turn goes on either way.
    async fn ingest(&mut self, message: ClientMessage) -> ChatMessage {
        match message {
            ClientMessage::Text { role, content } => ChatMessage::new(role, content),
            ClientMessage::FileUpload {
                role,
                content,
                attachment,
            } => {
                match self
                    .state
                    .uploads
                    .save(&attachment.name, attachment.content.as_bytes())
                    .await
                {
                    Ok(path) => {
                        info!(
                            name = %attachment.name,
                            media_type = %attachment.media_type,
                            path = %path.display(),
                            "Attachment persisted"
                        );
                        ChatMessage::new(
                            role,
                            format!("{}{}", UPLOAD_NOTICE_PREFIX, attachment.name),
                        )
                    }
                    Err(e) => {
                        error!(name = %attachment.name, error = %e, "Error saving file");
                        ChatMessage::new(role, content)
                    }
                }
            }
        }
    }

    /// Forward fragments to the client as they arrive, accumulating the
    /// assistant reply.
    ///
    /// The client's read half is watched while the reply streams: a peer
    /// disconnect cancels the in-flight upstream response (dropping the
    /// fragment stream aborts it) instead of letting it run to completion
    /// against a dead socket. Data frames seen here are queued for the next
    /// turn.
    async fn relay(
        &mut self,
        fragments: impl Stream<Item = StreamFragment>,
    ) -> Result<String, SessionError> {
        let Self {
            outbound,
            inbound,
            pending,
            ..
        } = self;
        let mut fragments = pin!(fragments);
        let mut reply = String::new();

        loop {
            tokio::select! {
                fragment = fragments.next() => match fragment {
                    Some(StreamFragment::Content(text)) => {
                        reply.push_str(&text);
                        send_to(
                            outbound,
                            &ServerEvent::StreamContent {
                                content: text,
                                role: MessageRole::Assistant,
                            },
                        )
                        .await?;
                    }
                    // The decoder already logged the offending line.
                    Some(StreamFragment::DecodeError(_)) => {}
                    Some(StreamFragment::Done) | None => break,
                },
                frame = inbound.next() => match frame {
                    Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                        Ok(message) => {
                            debug!("Queueing client message received mid-stream");
                            pending.push_back(message);
                        }
                        Err(e) => {
                            warn!(error = %e, "Malformed client frame mid-stream");
                            return Err(SessionError::Closed);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client disconnected; cancelling in-flight stream");
                        return Err(SessionError::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Error reading client mid-stream");
                        return Err(SessionError::Closed);
                    }
                },
            }
        }

        Ok(reply)
    }

    /// Send one event over the socket.
    async fn send(&mut self, event: &ServerEvent) -> Result<(), SessionError> {
        send_to(&mut self.outbound, event).await
    }
}

/// Serialize and write one event to the client's write half.
async fn send_to(
    outbound: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), SessionError> {
    let payload = serde_json::to_string(event)?;
    outbound
        .send(Message::Text(payload))
        .await
        .map_err(SessionError::Write)
}
