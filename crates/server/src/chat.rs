//! The chat turn endpoint.
//!
//! `POST /api/chat/{chatbot_id}` runs one full turn: resolve the chatbot,
//! find or start the conversation, persist the visitor message, assemble the
//! prompt context, run the three model-backed components concurrently, then
//! persist the reply and answer the widget.
//!
//! Failure policy follows the turn taxonomy: the request fails only on input
//! validation, chatbot resolution, or the writes leading up to the visitor
//! message. Everything after that point degrades (catalog and history reads
//! fall back to empty, post-reply writes are log-only) so the visitor still
//! gets an answer.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use storebot_agent::generator::ResponseGenerator;
use storebot_agent::intent::IntentClassifier;
use storebot_agent::relevance::ProductRanker;
use storebot_agent::LlmClient;
use storebot_core::context::{PromptContext, HISTORY_CAP};
use storebot_core::domain::analytics::{AnalyticsEvent, EventType};
use storebot_core::domain::chatbot::ChatbotId;
use storebot_core::domain::conversation::{Conversation, ConversationId};
use storebot_core::domain::message::SenderType;
use storebot_core::domain::product::Product;
use storebot_core::errors::TurnError;
use storebot_db::repositories::{
    AnalyticsRepository, BusinessRepository, ChatbotRepository, ConversationRepository,
    MessageRepository, ProductRepository, SqlAnalyticsRepository, SqlBusinessRepository,
    SqlChatbotRepository, SqlConversationRepository, SqlMessageRepository, SqlProductRepository,
};
use storebot_db::DbPool;

/// In-stock products loaded per turn; feeds both the prompt catalog slice and
/// the relevance ranker's candidate list.
const CATALOG_FETCH_LIMIT: i64 = 50;
/// Products surfaced back to the widget alongside the reply.
const RELEVANT_PRODUCT_LIMIT: usize = 3;

#[derive(Clone)]
pub struct ChatState {
    pub businesses: Arc<dyn BusinessRepository>,
    pub chatbots: Arc<dyn ChatbotRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
    pub generator: ResponseGenerator,
    pub intent: IntentClassifier,
    pub ranker: ProductRanker,
}

impl ChatState {
    pub fn new(pool: &DbPool, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            businesses: Arc::new(SqlBusinessRepository::new(pool.clone())),
            chatbots: Arc::new(SqlChatbotRepository::new(pool.clone())),
            products: Arc::new(SqlProductRepository::new(pool.clone())),
            conversations: Arc::new(SqlConversationRepository::new(pool.clone())),
            messages: Arc::new(SqlMessageRepository::new(pool.clone())),
            analytics: Arc::new(SqlAnalyticsRepository::new(pool.clone())),
            generator: ResponseGenerator::new(llm.clone()),
            intent: IntentClassifier::new(llm.clone()),
            ranker: ProductRanker::new(llm),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
    pub visitor_id: Option<String>,
}

/// `intent` is a plain string on the wire; confidence and entities travel
/// only in the persisted bot-message metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub response: String,
    pub conversation_id: String,
    pub intent: String,
    pub relevant_products: Vec<ProductPayload>,
}

#[derive(Debug, Serialize)]
pub struct ProductPayload {
    pub id: String,
    pub name: String,
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

impl From<Product> for ProductPayload {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.0.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.primary_image().map(str::to_string),
            permalink: product.permalink,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/chat/{chatbot_id}", post(chat_turn)).with_state(state)
}

pub async fn chat_turn(
    State(state): State<ChatState>,
    Path(chatbot_id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, (StatusCode, Json<ErrorResponse>)> {
    match run_turn(&state, &ChatbotId(chatbot_id), request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let status = match &error {
                TurnError::BadRequest(_) => StatusCode::BAD_REQUEST,
                TurnError::NotFound(_) => StatusCode::NOT_FOUND,
                TurnError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, Json(ErrorResponse { error: error.to_string() })))
        }
    }
}

async fn run_turn(
    state: &ChatState,
    chatbot_id: &ChatbotId,
    request: TurnRequest,
) -> Result<TurnResponse, TurnError> {
    let user_message = request.message.as_deref().map(str::trim).unwrap_or_default();
    if user_message.is_empty() {
        return Err(TurnError::BadRequest("message must not be empty".to_string()));
    }
    let visitor_id = request
        .visitor_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TurnError::BadRequest("visitorId must not be empty".to_string()))?;

    let chatbot = state
        .chatbots
        .find_active(chatbot_id)
        .await
        .map_err(|error| TurnError::Storage(format!("chatbot lookup failed: {error}")))?
        .ok_or_else(|| TurnError::NotFound(format!("no active chatbot `{}`", chatbot_id.0)))?;

    let business = state
        .businesses
        .find_by_id(&chatbot.business_id)
        .await
        .map_err(|error| TurnError::Storage(format!("business lookup failed: {error}")))?
        .ok_or_else(|| {
            TurnError::Storage(format!(
                "business `{}` missing for chatbot `{}`",
                chatbot.business_id.0, chatbot.id.0
            ))
        })?;

    let (conversation, started) =
        resolve_conversation(state, &chatbot.id, request.conversation_id.as_deref(), visitor_id)
            .await?;
    if started {
        record_event(
            state,
            &chatbot.id,
            visitor_id,
            EventType::ConversationStarted,
            json!({ "conversation_id": conversation.id.0 }),
        )
        .await;
    }

    let stored_user = state
        .messages
        .append(&conversation.id, user_message, SenderType::User, None)
        .await
        .map_err(|error| TurnError::Storage(format!("could not persist user message: {error}")))?;

    let products = match state.products.list_in_stock(&business.id, CATALOG_FETCH_LIMIT).await {
        Ok(products) => products,
        Err(error) => {
            warn!(
                event_name = "chat.catalog_read_failed",
                error = %error,
                "catalog read failed, answering without product context"
            );
            Vec::new()
        }
    };

    // The visitor message was just written, so it comes back in the recent
    // window; history must exclude the current turn.
    let history = match state.messages.recent(&conversation.id, (HISTORY_CAP + 1) as i64).await {
        Ok(mut history) => {
            history.retain(|message| message.id != stored_user.id);
            history
        }
        Err(error) => {
            warn!(
                event_name = "chat.history_read_failed",
                error = %error,
                "history read failed, answering without conversation context"
            );
            Vec::new()
        }
    };

    let context = PromptContext::assemble(&chatbot, &business, &products, &history, user_message);

    let (reply, analysis, relevant) = tokio::join!(
        state.generator.generate(&context),
        state.intent.classify(user_message),
        state.ranker.rank(user_message, &products, RELEVANT_PRODUCT_LIMIT),
    );

    let metadata = json!({
        "intent": analysis.intent.as_str(),
        "confidence": analysis.confidence,
        "entities": analysis.entities,
        "relevant_products": relevant
            .iter()
            .map(|product| json!({ "id": product.id.0, "name": product.name, "price": product.price }))
            .collect::<Vec<_>>(),
    });
    if let Err(error) =
        state.messages.append(&conversation.id, &reply, SenderType::Bot, Some(metadata)).await
    {
        warn!(
            event_name = "chat.bot_message_write_failed",
            error = %error,
            "bot reply not persisted, returning it to the visitor anyway"
        );
    }

    if let Err(error) = state.conversations.touch(&conversation.id).await {
        warn!(event_name = "chat.conversation_touch_failed", error = %error, "conversation timestamp not updated");
    }

    record_event(
        state,
        &chatbot.id,
        visitor_id,
        EventType::MessageSent,
        json!({
            "conversation_id": conversation.id.0,
            "intent": analysis.intent.as_str(),
            "confidence": analysis.confidence,
        }),
    )
    .await;

    Ok(TurnResponse {
        response: reply,
        conversation_id: conversation.id.0,
        intent: analysis.intent.as_str().to_string(),
        relevant_products: relevant.into_iter().map(ProductPayload::from).collect(),
    })
}

/// A known conversation id resumes that conversation; an unknown or absent id
/// starts a fresh one rather than failing the turn. The boolean reports
/// whether a conversation was started.
async fn resolve_conversation(
    state: &ChatState,
    chatbot_id: &ChatbotId,
    requested: Option<&str>,
    visitor_id: &str,
) -> Result<(Conversation, bool), TurnError> {
    if let Some(raw) = requested.map(str::trim).filter(|value| !value.is_empty()) {
        match state
            .conversations
            .find_for_chatbot(&ConversationId(raw.to_string()), chatbot_id)
            .await
        {
            Ok(Some(conversation)) => return Ok((conversation, false)),
            Ok(None) => {}
            Err(error) => {
                return Err(TurnError::Storage(format!("conversation lookup failed: {error}")))
            }
        }
    }

    let conversation = state
        .conversations
        .create(chatbot_id, visitor_id)
        .await
        .map_err(|error| TurnError::Storage(format!("could not create conversation: {error}")))?;
    Ok((conversation, true))
}

async fn record_event(
    state: &ChatState,
    chatbot_id: &ChatbotId,
    visitor_id: &str,
    event_type: EventType,
    event_data: serde_json::Value,
) {
    let event = AnalyticsEvent {
        chatbot_id: chatbot_id.clone(),
        visitor_id: Some(visitor_id.to_string()),
        event_type,
        event_data,
    };
    if let Err(error) = state.analytics.record(event).await {
        warn!(
            event_name = "chat.analytics_write_failed",
            error = %error,
            "analytics event not recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;

    use storebot_agent::generator::ResponseGenerator;
    use storebot_agent::intent::IntentClassifier;
    use storebot_agent::relevance::ProductRanker;
    use storebot_agent::testing::ScriptedLlmClient;
    use storebot_core::domain::analytics::EventType;
    use storebot_core::domain::business::{Business, BusinessId};
    use storebot_core::domain::chatbot::{Chatbot, ChatbotId, WidgetPosition};
    use storebot_core::domain::conversation::ConversationId;
    use storebot_core::domain::message::{Message, SenderType};
    use storebot_core::domain::product::{Product, ProductId};
    use storebot_db::repositories::{
        InMemoryAnalyticsRepository, InMemoryBusinessRepository, InMemoryChatbotRepository,
        InMemoryConversationRepository, InMemoryMessageRepository, InMemoryProductRepository,
        MessageRepository, RepositoryError,
    };

    use super::{chat_turn, ChatState, TurnRequest};

    const FALLBACK: &str = "Sorry, let me get a human.";

    struct Harness {
        state: ChatState,
        businesses: Arc<InMemoryBusinessRepository>,
        chatbots: Arc<InMemoryChatbotRepository>,
        products: Arc<InMemoryProductRepository>,
        messages: Arc<InMemoryMessageRepository>,
        analytics: Arc<InMemoryAnalyticsRepository>,
        client: Arc<ScriptedLlmClient>,
    }

    fn harness(client: ScriptedLlmClient) -> Harness {
        let client = Arc::new(client);
        let businesses = Arc::new(InMemoryBusinessRepository::default());
        let chatbots = Arc::new(InMemoryChatbotRepository::default());
        let products = Arc::new(InMemoryProductRepository::default());
        let conversations = Arc::new(InMemoryConversationRepository::default());
        let messages = Arc::new(InMemoryMessageRepository::default());
        let analytics = Arc::new(InMemoryAnalyticsRepository::default());

        let state = ChatState {
            businesses: businesses.clone(),
            chatbots: chatbots.clone(),
            products: products.clone(),
            conversations,
            messages: messages.clone(),
            analytics: analytics.clone(),
            generator: ResponseGenerator::new(client.clone()),
            intent: IntentClassifier::new(client.clone()),
            ranker: ProductRanker::new(client.clone()),
        };

        Harness { state, businesses, chatbots, products, messages, analytics, client }
    }

    async fn seed_tenant(harness: &Harness, active: bool) {
        harness
            .businesses
            .insert(Business {
                id: BusinessId("biz-1".to_string()),
                name: "Acme Outdoors".to_string(),
                description: Some("camping gear".to_string()),
                website_url: Some("https://acme.test".to_string()),
                store_url: None,
                store_consumer_key: None,
                store_consumer_secret: None,
            })
            .await;
        harness
            .chatbots
            .insert(Chatbot {
                id: ChatbotId("bot-1".to_string()),
                business_id: BusinessId("biz-1".to_string()),
                name: "Acme Assistant".to_string(),
                description: None,
                welcome_message: "Hi there!".to_string(),
                fallback_message: FALLBACK.to_string(),
                is_active: active,
                widget_color: "#2563eb".to_string(),
                widget_position: WidgetPosition::BottomRight,
            })
            .await;
    }

    async fn seed_products(harness: &Harness, count: usize) {
        for index in 0..count {
            harness
                .products
                .insert(Product {
                    id: ProductId(format!("prod-{index}")),
                    business_id: BusinessId("biz-1".to_string()),
                    external_id: index as i64,
                    name: format!("Tent {index}"),
                    description: None,
                    short_description: Some("<p>Two-person tent</p>".to_string()),
                    price: Some(99.5),
                    regular_price: None,
                    sale_price: None,
                    sku: Some(format!("TNT-{index}")),
                    stock_quantity: Some(4),
                    in_stock: true,
                    categories: vec!["camping".to_string()],
                    tags: vec![],
                    images: vec!["https://img.acme.test/tent.jpg".to_string()],
                    permalink: Some(format!("https://shop.acme.test/tent-{index}")),
                })
                .await;
        }
    }

    fn request(message: Option<&str>, conversation_id: Option<&str>) -> TurnRequest {
        TurnRequest {
            message: message.map(str::to_string),
            conversation_id: conversation_id.map(str::to_string),
            visitor_id: Some("visitor-1".to_string()),
        }
    }

    fn scripted() -> ScriptedLlmClient {
        ScriptedLlmClient::default()
            .with_reply("We stock three tents.")
            .with_intent_json(
                r#"{"intent": "product_inquiry", "confidence": 0.9, "entities": ["tent"]}"#,
            )
            .with_ranking("1, 0")
    }

    #[tokio::test]
    async fn happy_path_persists_both_turns_and_answers_with_products() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;
        seed_products(&harness, 3).await;

        let Json(response) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("any tents?"), None)),
        )
        .await
        .expect("turn succeeds");

        assert_eq!(response.response, "We stock three tents.");
        assert_eq!(response.intent, "product_inquiry");
        let names: Vec<_> = response.relevant_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tent 1", "Tent 0"]);
        assert_eq!(
            response.relevant_products[0].image.as_deref(),
            Some("https://img.acme.test/tent.jpg")
        );

        let stored = harness.messages.all().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].sender_type, SenderType::User);
        assert_eq!(stored[0].content, "any tents?");
        assert_eq!(stored[1].sender_type, SenderType::Bot);
        assert_eq!(stored[1].metadata["intent"], "product_inquiry");
        assert_eq!(stored[1].metadata["confidence"], 0.9);
        assert_eq!(stored[1].metadata["entities"][0], "tent");
        assert_eq!(stored[1].metadata["relevant_products"][0]["name"], "Tent 1");

        let events = harness.analytics.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::ConversationStarted);
        assert_eq!(events[1].event_type, EventType::MessageSent);
        assert_eq!(events[1].event_data["intent"], "product_inquiry");
    }

    #[tokio::test]
    async fn resuming_a_conversation_keeps_its_id_and_starts_no_new_one() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;

        let Json(first) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("hello"), None)),
        )
        .await
        .expect("first turn");

        let Json(second) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("still there?"), Some(&first.conversation_id))),
        )
        .await
        .expect("second turn");

        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(harness.messages.all().await.len(), 4);

        let started = harness
            .analytics
            .events()
            .await
            .into_iter()
            .filter(|event| event.event_type == EventType::ConversationStarted)
            .count();
        assert_eq!(started, 1);
    }

    #[tokio::test]
    async fn unknown_conversation_id_starts_a_fresh_conversation() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;

        let Json(response) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("hello"), Some("conv-does-not-exist"))),
        )
        .await
        .expect("turn succeeds");

        assert_ne!(response.conversation_id, "conv-does-not-exist");
        let events = harness.analytics.events().await;
        assert_eq!(events[0].event_type, EventType::ConversationStarted);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;

        for message in [None, Some("   ")] {
            let (status, _) = chat_turn(
                State(harness.state.clone()),
                Path("bot-1".to_string()),
                Json(request(message, None)),
            )
            .await
            .err()
            .expect("rejected");
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert!(harness.messages.all().await.is_empty());
    }

    #[tokio::test]
    async fn missing_visitor_id_is_rejected() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;

        let mut turn = request(Some("hello"), None);
        turn.visitor_id = None;

        let (status, _) =
            chat_turn(State(harness.state.clone()), Path("bot-1".to_string()), Json(turn))
                .await
                .err()
                .expect("rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(harness.messages.all().await.is_empty());
    }

    #[tokio::test]
    async fn inactive_chatbot_is_not_found() {
        let harness = harness(scripted());
        seed_tenant(&harness, false).await;

        let (status, _) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("hello"), None)),
        )
        .await
        .err()
        .expect("rejected");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn model_failure_answers_with_the_configured_fallback() {
        let harness = harness(ScriptedLlmClient::failing());
        seed_tenant(&harness, true).await;

        let Json(response) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("hello"), None)),
        )
        .await
        .expect("turn still succeeds");

        assert_eq!(response.response, FALLBACK);
        assert_eq!(response.intent, "general");
        assert!(response.relevant_products.is_empty());

        let stored = harness.messages.all().await;
        assert_eq!(stored[1].content, FALLBACK);
        assert_eq!(stored[1].metadata["confidence"], 0.5);
    }

    #[tokio::test]
    async fn empty_catalog_skips_the_ranking_call() {
        let harness = harness(scripted());
        seed_tenant(&harness, true).await;

        let Json(response) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("any tents?"), None)),
        )
        .await
        .expect("turn succeeds");

        assert!(response.relevant_products.is_empty());
        assert_eq!(harness.client.ranking_calls(), 0);
        assert_eq!(harness.client.total_calls(), 2);
    }

    struct FailingMessageRepository;

    #[async_trait::async_trait]
    impl MessageRepository for FailingMessageRepository {
        async fn append(
            &self,
            _conversation_id: &ConversationId,
            _content: &str,
            _sender: SenderType,
            _metadata: Option<serde_json::Value>,
        ) -> Result<Message, RepositoryError> {
            Err(RepositoryError::Decode("injected write failure".to_string()))
        }

        async fn recent(
            &self,
            _conversation_id: &ConversationId,
            _limit: i64,
        ) -> Result<Vec<Message>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    /// Delegates the first `append` (the visitor turn) and fails every later
    /// one, so only post-reply writes break.
    struct BotWriteFailingMessageRepository {
        inner: InMemoryMessageRepository,
        appends: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessageRepository for BotWriteFailingMessageRepository {
        async fn append(
            &self,
            conversation_id: &ConversationId,
            content: &str,
            sender: SenderType,
            metadata: Option<serde_json::Value>,
        ) -> Result<Message, RepositoryError> {
            if self.appends.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                return Err(RepositoryError::Decode("injected write failure".to_string()));
            }
            self.inner.append(conversation_id, content, sender, metadata).await
        }

        async fn recent(
            &self,
            conversation_id: &ConversationId,
            limit: i64,
        ) -> Result<Vec<Message>, RepositoryError> {
            self.inner.recent(conversation_id, limit).await
        }
    }

    #[tokio::test]
    async fn bot_message_write_failure_still_answers_the_visitor() {
        let mut harness = harness(scripted());
        harness.state.messages = Arc::new(BotWriteFailingMessageRepository {
            inner: InMemoryMessageRepository::default(),
            appends: std::sync::atomic::AtomicUsize::new(0),
        });
        seed_tenant(&harness, true).await;

        let Json(response) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("any tents?"), None)),
        )
        .await
        .expect("turn still succeeds");

        assert_eq!(response.response, "We stock three tents.");
        assert_eq!(response.intent, "product_inquiry");
    }

    #[tokio::test]
    async fn user_message_write_failure_fails_the_turn() {
        let mut harness = harness(scripted());
        harness.state.messages = Arc::new(FailingMessageRepository);
        seed_tenant(&harness, true).await;

        let (status, _) = chat_turn(
            State(harness.state.clone()),
            Path("bot-1".to_string()),
            Json(request(Some("hello"), None)),
        )
        .await
        .err()
        .expect("rejected");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(harness.client.total_calls(), 0);
    }
}
