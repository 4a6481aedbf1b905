//! Completions API integration
//!
//! The HTTP client that dispatches transcript requests and the decoder that
//! turns streamed response bodies into fragments.

pub mod client;
pub mod stream;

pub use client::{CompletionsClient, UpstreamError};
pub use stream::{decode_response, StreamFragment};
