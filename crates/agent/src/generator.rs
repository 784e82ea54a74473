use std::sync::Arc;

use tracing::warn;

use storebot_core::context::PromptContext;

use crate::{CompletionRequest, LlmClient};

/// Replies stay bounded; temperature keeps answers conversational without
/// drifting far between runs.
const MAX_REPLY_TOKENS: u32 = 500;
const REPLY_TEMPERATURE: f32 = 0.7;

/// Produces the visitor-facing reply for an assembled context.
///
/// Guaranteed non-throwing: any invocation error, and any empty or
/// whitespace-only completion, yields the chatbot's configured fallback
/// message verbatim.
#[derive(Clone)]
pub struct ResponseGenerator {
    client: Arc<dyn LlmClient>,
}

impl ResponseGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, context: &PromptContext) -> String {
        let request = CompletionRequest {
            messages: context.messages.clone(),
            max_tokens: MAX_REPLY_TOKENS,
            temperature: REPLY_TEMPERATURE,
        };

        match self.client.complete(request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(event_name = "agent.generate.empty_completion", "model returned blank reply, using fallback message");
                context.fallback_message.clone()
            }
            Err(error) => {
                warn!(
                    event_name = "agent.generate.failed",
                    error = %error,
                    "model call failed, using fallback message"
                );
                context.fallback_message.clone()
            }
        }
    }
}
