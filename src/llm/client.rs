//! Completions API client
//!
//! Direct HTTP client for the streaming chat-completions endpoint. Each
//! request carries the full conversation transcript and asks for a streamed
//! reply; the raw response body is handed to the stream decoder.

use crate::chat::models::ChatMessage;
use crate::config::UpstreamConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed path of the chat-completions endpoint, appended to the base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Errors raised while dispatching a completion request
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The request could not be built or sent
    #[error("failed to send request to completions API: {0}")]
    Dispatch(#[from] reqwest::Error),
}

/// Request body of the chat-completions endpoint
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Client for the streaming chat-completions API
///
/// Cheap to clone; every clone shares the same connection pool.
#[derive(Debug, Clone)]
pub struct CompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompletionsClient {
    /// Create a client from the upstream configuration
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Dispatch the transcript as a streaming completion request.
    ///
    /// Returns the raw streaming response on success. A non-success HTTP
    /// status is logged but not treated as a dispatch failure; an
    /// error-shaped body simply decodes to skipped lines downstream.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        debug!(
            url = %url,
            model = %self.model,
            transcript_len = messages.len(),
            "Dispatching completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Completions API responded");
        } else {
            warn!(status = %status, "Completions API returned non-success status");
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::MessageRole;
    use crate::llm::stream::{decode_response, StreamFragment};
    use futures_util::StreamExt;
    use mockito::{Matcher, Server};
    use serial_test::serial;

    fn test_client(base_url: &str) -> CompletionsClient {
        CompletionsClient::new(&UpstreamConfig {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            model: "deepseek-chat".to_string(),
        })
    }

    #[tokio::test]
    #[serial]
    async fn stream_chat_sends_transcript_and_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::Json(serde_json::json!({
                "model": "deepseek-chat",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true,
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n",
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let transcript = vec![ChatMessage::new(MessageRole::User, "hello".to_string())];
        let response = client
            .stream_chat(&transcript)
            .await
            .expect("dispatch should succeed");

        let fragments: Vec<StreamFragment> = decode_response(response).collect().await;
        assert_eq!(
            fragments,
            vec![
                StreamFragment::Content("Hi".to_string()),
                StreamFragment::Done,
            ]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stream_chat_fails_when_upstream_is_unreachable() {
        // Bind a port, then drop the listener so the address refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let client = test_client(&format!("http://{}", addr));
        let transcript = vec![ChatMessage::new(MessageRole::User, "hello".to_string())];
        let result = client.stream_chat(&transcript).await;
        assert!(matches!(result, Err(UpstreamError::Dispatch(_))));
    }

    #[tokio::test]
    #[serial]
    async fn stream_chat_tolerates_non_success_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let client = test_client(&server.url());
        let transcript = vec![ChatMessage::new(MessageRole::User, "hello".to_string())];
        let response = client
            .stream_chat(&transcript)
            .await
            .expect("an error status is not a dispatch failure");

        // The error body degrades to a skipped decode line, not a failure.
        let fragments: Vec<StreamFragment> = decode_response(response).collect().await;
        assert_eq!(fragments.len(), 1);
        assert!(matches!(fragments[0], StreamFragment::DecodeError(_)));
    }
}
