use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use storebot_core::context::{ChatMessage, ChatRole};

use crate::{CompletionRequest, LlmClient};

const MAX_INTENT_TOKENS: u32 = 100;
const INTENT_TEMPERATURE: f32 = 0.1;

const INTENT_SYSTEM_PROMPT: &str = "Analyze the customer message and return a JSON object with:\n\
- intent: one of \"product_inquiry\", \"support\", \"general\", \"greeting\"\n\
- confidence: number between 0 and 1\n\
- entities: array of important keywords/entities mentioned\n\
\n\
Return only valid JSON, no other text.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    ProductInquiry,
    Support,
    General,
    Greeting,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductInquiry => "product_inquiry",
            Self::Support => "support",
            Self::General => "general",
            Self::Greeting => "greeting",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "product_inquiry" => Some(Self::ProductInquiry),
            "support" => Some(Self::Support),
            "general" => Some(Self::General),
            "greeting" => Some(Self::Greeting),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntentAnalysis {
    pub intent: Intent,
    pub confidence: f64,
    pub entities: Vec<String>,
}

impl IntentAnalysis {
    /// Deterministic result used whenever the model output cannot be trusted.
    pub fn fallback() -> Self {
        Self { intent: Intent::General, confidence: 0.5, entities: Vec::new() }
    }
}

/// Classifies a visitor message into a coarse intent with confidence.
/// Never errors: unusable model output degrades to [`IntentAnalysis::fallback`].
#[derive(Clone)]
pub struct IntentClassifier {
    client: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn classify(&self, message: &str) -> IntentAnalysis {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage { role: ChatRole::System, content: INTENT_SYSTEM_PROMPT.to_string() },
                ChatMessage {
                    role: ChatRole::User,
                    content: format!("Analyze this message: \"{message}\""),
                },
            ],
            max_tokens: MAX_INTENT_TOKENS,
            temperature: INTENT_TEMPERATURE,
        };

        match self.client.complete(request).await {
            Ok(text) => parse_analysis(&text).unwrap_or_else(|| {
                warn!(
                    event_name = "agent.intent.unparseable",
                    "model returned unusable intent JSON, using fallback classification"
                );
                IntentAnalysis::fallback()
            }),
            Err(error) => {
                warn!(
                    event_name = "agent.intent.failed",
                    error = %error,
                    "intent call failed, using fallback classification"
                );
                IntentAnalysis::fallback()
            }
        }
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    intent: String,
    confidence: f64,
    #[serde(default)]
    entities: Vec<String>,
}

/// Model output is untrusted: JSON may be fenced, malformed, or carry values
/// outside the contract. Anything that does not parse cleanly is rejected.
fn parse_analysis(text: &str) -> Option<IntentAnalysis> {
    let raw: RawAnalysis = serde_json::from_str(strip_code_fences(text)).ok()?;
    let intent = Intent::parse(&raw.intent)?;
    if !raw.confidence.is_finite() {
        return None;
    }

    Some(IntentAnalysis {
        intent,
        confidence: raw.confidence.clamp(0.0, 1.0),
        entities: raw.entities,
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
