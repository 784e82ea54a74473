//! Scripted [`LlmClient`] double for pipeline tests.
//!
//! The three turn-pipeline calls run concurrently, so a simple FIFO of canned
//! replies would be racy. Instead each call is routed by its system prompt to
//! a per-component outcome slot; unset slots fail the call, which exercises
//! the components' fallback paths.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use storebot_core::context::ChatRole;

use crate::{CompletionRequest, LlmClient};

#[derive(Clone, Debug)]
pub enum ScriptedOutcome {
    Text(String),
    Failure(String),
}

#[derive(Default)]
pub struct ScriptedLlmClient {
    reply: Option<ScriptedOutcome>,
    intent: Option<ScriptedOutcome>,
    ranking: Option<ScriptedOutcome>,
    total_calls: AtomicUsize,
    ranking_calls: AtomicUsize,
}

impl ScriptedLlmClient {
    /// A client with no scripted outcomes: every call fails, driving all
    /// three components into their fallbacks.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, text: &str) -> Self {
        self.reply = Some(ScriptedOutcome::Text(text.to_string()));
        self
    }

    pub fn with_intent_json(mut self, json: &str) -> Self {
        self.intent = Some(ScriptedOutcome::Text(json.to_string()));
        self
    }

    pub fn with_ranking(mut self, indices: &str) -> Self {
        self.ranking = Some(ScriptedOutcome::Text(indices.to_string()));
        self
    }

    pub fn with_reply_outcome(mut self, outcome: ScriptedOutcome) -> Self {
        self.reply = Some(outcome);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn ranking_calls(&self) -> usize {
        self.ranking_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let system = request
            .messages
            .iter()
            .find(|message| message.role == ChatRole::System)
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        let slot = if system.contains("product recommendation system") {
            self.ranking_calls.fetch_add(1, Ordering::SeqCst);
            &self.ranking
        } else if system.contains("Analyze the customer message") {
            &self.intent
        } else {
            &self.reply
        };

        match slot {
            Some(ScriptedOutcome::Text(text)) => Ok(text.clone()),
            Some(ScriptedOutcome::Failure(message)) => Err(anyhow!("{message}")),
            None => Err(anyhow!("no scripted outcome for this call")),
        }
    }
}
