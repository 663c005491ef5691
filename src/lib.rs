//! Conversation-level client for OpenAI-compatible completion and image APIs.
//!
//! [`GptClient`] fits a conversation into a character budget, picks the chat
//! or legacy text endpoint for the configured [`Engine`], and streams the
//! reply through a callback. HTTP, event-stream decoding and retry live in
//! the `openai_api` crate.

pub mod budget;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod transport;

pub use budget::{BudgetError, BudgetStrategy, ContextBudget, CLIP_MARGIN, DEFAULT_CONTEXT_BUDGET};
pub use client::{CompletionOutput, GptClient};
pub use config::ClientOptions;
pub use engine::Engine;
pub use error::Error;
pub use transport::Transport;

pub use openai_api;
