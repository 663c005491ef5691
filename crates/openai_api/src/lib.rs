//! Transport-level client for the OpenAI-compatible completion and image APIs.
//!
//! This crate owns request construction, the event-stream decoder, projection
//! of streamed frames onto typed responses, and retry with backoff. It knows
//! nothing about conversations or context budgeting; callers hand it complete
//! request payloads.
//!
//! Streaming calls run one decoder and one reusable response accumulator per
//! call; nothing in here is shared between concurrent calls except the
//! read-only [`ApiConfig`].

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod response;
pub mod retry;
pub mod sse;
pub mod stream;
pub mod url;

pub use cancel::CancellationSignal;
pub use client::OpenAiClient;
pub use config::ApiConfig;
pub use error::ApiError;
pub use payload::{
    ChatCompletionRequest, ChatMessage, CompletionRequest, CreateImageRequest,
    CreateImageResponse, ImageSize, Role,
};
pub use response::{ChatCompletionResponse, CompletionChunk, TextCompletionResponse, Usage};
pub use retry::{Backoff, RetryPolicy};
pub use sse::{DecodedFrame, EventStreamDecoder, EventStreamReader, RawEvent};
pub use url::endpoint_url;
