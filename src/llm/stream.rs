//! Streaming response decoder
//!
//! Turns the chunked body of a streaming completions response into a lazy
//! sequence of [`StreamFragment`]s: one fragment per non-empty text delta,
//! a sentinel when the upstream signals completion, and a skip marker for
//! every line that fails to decode.
//!
//! Each JSON payload is expected to occupy exactly one line. A payload the
//! upstream splits across lines is not reassembled; both halves fail to
//! decode and are skipped. This is a known limitation of the wire format
//! handling, kept for compatibility with the upstream's framing.

use async_stream::stream;
use futures_util::{Stream, TryStreamExt};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Event prefix in front of each data line of the stream.
pub const DATA_PREFIX: &str = "data: ";
/// Literal marker signalling the end of a streamed response.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One unit of decoder output, consumed exactly once per turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// A non-empty incremental piece of assistant text
    Content(String),
    /// The termination sentinel was observed; the response is complete
    Done,
    /// A line failed to decode and was skipped
    DecodeError(String),
}

/// One decoded line of the streaming response body
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: String,
}

/// Decode the body of a streaming completions response.
///
/// The returned stream is finite and non-restartable; dropping it aborts
/// the underlying HTTP response.
pub fn decode_response(response: reqwest::Response) -> impl Stream<Item = StreamFragment> {
    // Box::pin because the byte stream is not Unpin, which the line reader
    // requires.
    let reader = StreamReader::new(Box::pin(
        response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    ));
    decode_lines(reader)
}

/// Decode discrete lines read from any buffered source.
fn decode_lines<R>(reader: R) -> impl Stream<Item = StreamFragment>
where
    R: AsyncBufRead + Unpin,
{
    stream! {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                // Upstream closed without a sentinel; treat as a clean end.
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Error reading response stream");
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }

            let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line.as_str());
            if payload == DONE_SENTINEL {
                debug!("Received completion sentinel");
                yield StreamFragment::Done;
                break;
            }

            match serde_json::from_str::<StreamChunk>(payload) {
                Ok(chunk) => {
                    // Only the first choice is consulted.
                    let delta = chunk
                        .choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.delta.content)
                        .unwrap_or_default();
                    if !delta.is_empty() {
                        yield StreamFragment::Content(delta);
                    }
                }
                Err(e) => {
                    warn!(error = %e, line = %payload, "Failed to decode stream line");
                    yield StreamFragment::DecodeError(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(lines: &[&str]) -> Vec<StreamFragment> {
        let input = lines.join("\n");
        let reader = tokio::io::BufReader::new(input.as_bytes());
        decode_lines(reader).collect().await
    }

    #[tokio::test]
    async fn yields_deltas_in_order_and_stops_at_sentinel() {
        let fragments = collect(&[
            r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":" there"}}]}"#,
            "",
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"never read"}}]}"#,
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::Content("Hi".to_string()),
                StreamFragment::Content(" there".to_string()),
                StreamFragment::Done,
            ]
        );
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_without_halting() {
        let fragments = collect(&[
            "data: {not json",
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            "data: [DONE]",
        ])
        .await;

        assert_eq!(fragments.len(), 3);
        assert!(matches!(fragments[0], StreamFragment::DecodeError(_)));
        assert_eq!(fragments[1], StreamFragment::Content("ok".to_string()));
        assert_eq!(fragments[2], StreamFragment::Done);
    }

    #[tokio::test]
    async fn empty_delta_yields_no_fragment() {
        let fragments = collect(&[
            r#"data: {"choices":[{"delta":{"content":""}}]}"#,
            r#"data: {"choices":[{"delta":{}}]}"#,
            r#"data: {"choices":[]}"#,
            "data: [DONE]",
        ])
        .await;

        assert_eq!(fragments, vec![StreamFragment::Done]);
    }

    #[tokio::test]
    async fn only_first_choice_is_consulted() {
        let fragments = collect(&[
            r#"data: {"choices":[{"delta":{"content":"first"}},{"delta":{"content":"second"}}]}"#,
            "data: [DONE]",
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::Content("first".to_string()),
                StreamFragment::Done,
            ]
        );
    }

    #[tokio::test]
    async fn exhaustion_without_sentinel_ends_cleanly() {
        let fragments = collect(&[r#"data: {"choices":[{"delta":{"content":"tail"}}]}"#]).await;

        assert_eq!(
            fragments,
            vec![StreamFragment::Content("tail".to_string())]
        );
    }

    #[tokio::test]
    async fn line_without_event_prefix_still_decodes() {
        let fragments = collect(&[
            r#"{"choices":[{"delta":{"content":"bare"}}]}"#,
            "data: [DONE]",
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::Content("bare".to_string()),
                StreamFragment::Done,
            ]
        );
    }
}
