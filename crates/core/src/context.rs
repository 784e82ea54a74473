//! Context assembly for a chat turn.
//!
//! Builds the bounded set of messages handed to the language model: one
//! system instruction block (business identity, a capped catalog slice, and
//! behavioral guidance), the trimmed conversation history, then the current
//! user turn. Pure data transformation — deterministic for identical inputs,
//! no model call, no I/O.

use serde::{Deserialize, Serialize};

use crate::domain::business::Business;
use crate::domain::chatbot::Chatbot;
use crate::domain::message::{Message, SenderType};
use crate::domain::product::Product;

/// Catalog lines embedded in the system prompt are capped to bound token
/// usage. Larger catalogs are truncated, not summarized.
pub const PROMPT_PRODUCT_CAP: usize = 20;

/// History turns kept per prompt. Bounds prompt size, not a UX choice.
pub const HISTORY_CAP: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The assembled context window for one turn, plus the fallback reply the
/// generator must use when the model cannot produce a grounded answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptContext {
    pub messages: Vec<ChatMessage>,
    pub fallback_message: String,
}

impl PromptContext {
    /// `history` is the stored conversation excluding the current user turn;
    /// only the newest [`HISTORY_CAP`] entries are kept. The current turn is
    /// always the final message.
    pub fn assemble(
        chatbot: &Chatbot,
        business: &Business,
        products: &[Product],
        history: &[Message],
        user_message: &str,
    ) -> Self {
        let mut messages =
            vec![ChatMessage { role: ChatRole::System, content: system_prompt(chatbot, business, products) }];

        let start = history.len().saturating_sub(HISTORY_CAP);
        for turn in &history[start..] {
            let role = match turn.sender_type {
                SenderType::User => ChatRole::User,
                SenderType::Bot => ChatRole::Assistant,
            };
            messages.push(ChatMessage { role, content: turn.content.clone() });
        }

        messages.push(ChatMessage { role: ChatRole::User, content: user_message.to_string() });

        Self { messages, fallback_message: chatbot.fallback_message.clone() }
    }
}

fn system_prompt(chatbot: &Chatbot, business: &Business, products: &[Product]) -> String {
    let identity = match business.description.as_deref() {
        Some(description) if !description.trim().is_empty() => {
            format!("{}, {}", business.name, description.trim())
        }
        _ => business.name.clone(),
    };

    let catalog = if products.is_empty() {
        "No products available".to_string()
    } else {
        products.iter().take(PROMPT_PRODUCT_CAP).map(product_line).collect::<Vec<_>>().join("\n")
    };

    format!(
        "You are an AI customer service assistant for {identity}.\n\
         \n\
         Your role:\n\
         - Help customers find products and answer questions about them\n\
         - Provide helpful, friendly, and professional customer service\n\
         - Recommend products based on customer needs\n\
         - Answer questions about orders, shipping, returns, and general inquiries\n\
         \n\
         Business Information:\n\
         - Business Name: {name}\n\
         - Website: {website}\n\
         - Description: {description}\n\
         \n\
         Available Products:\n\
         {catalog}\n\
         \n\
         Guidelines:\n\
         - Always be helpful, friendly, and professional\n\
         - If you don't know something, admit it and suggest contacting customer service\n\
         - When recommending products, explain why they're a good fit\n\
         - Keep responses concise but informative\n\
         - If a customer asks about something not related to the business, politely redirect them\n\
         - Use the fallback message \"{fallback}\" when you truly don't understand\n\
         \n\
         Remember: You represent {name} and should maintain their brand voice and values.",
        identity = identity,
        name = business.name,
        website = business.website_url.as_deref().unwrap_or("Not provided"),
        description = business.description.as_deref().unwrap_or("Not provided"),
        catalog = catalog,
        fallback = chatbot.fallback_message,
    )
}

fn product_line(product: &Product) -> String {
    let price = match product.price {
        Some(value) => format!("${value}"),
        None => "$N/A".to_string(),
    };
    let description = product
        .short_description
        .as_deref()
        .map(strip_tags)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "No description".to_string());
    let availability = if product.in_stock { "In Stock" } else { "Out of Stock" };

    format!(
        "- {} ({}): {} - {} - {}",
        product.name,
        product.sku.as_deref().unwrap_or("No SKU"),
        price,
        description,
        availability,
    )
}

/// Drops HTML tags from storefront descriptions; text between tags survives.
pub fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}
