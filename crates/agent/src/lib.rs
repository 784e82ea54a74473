//! Model-backed components of the turn pipeline.
//!
//! This crate owns every language-model call the platform makes:
//! - **Response generation** (`generator`) - the visitor-facing reply
//! - **Intent classification** (`intent`) - coarse message categorization
//! - **Relevance ranking** (`relevance`) - catalog items matching the message
//!
//! # Error boundary
//!
//! The three components form a strict boundary: no model failure ever
//! propagates past them. Each call is wrapped in a normalize step that yields
//! one of a small closed set of outcomes - a typed success or a deterministic
//! fallback. The orchestrator in `storebot-server` can therefore treat all
//! three as infallible.
//!
//! # Client
//!
//! All components share one immutable [`LlmClient`] handle, constructed once
//! at bootstrap and injected by reference. `OpenAiClient` speaks the
//! OpenAI-compatible `chat/completions` wire format, which covers both the
//! hosted API and a local Ollama endpoint.

pub mod client;
pub mod generator;
pub mod intent;
pub mod relevance;
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;

use storebot_core::context::ChatMessage;

/// One bounded completion request. `messages` is the full context window in
/// provider order: system first, current user turn last.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
