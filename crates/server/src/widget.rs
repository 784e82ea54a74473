//! `GET /api/widget/{chatbot_id}` serves the embeddable widget bootstrap
//! script with the chatbot's configuration baked in. Storefronts include it
//! with a single `<script>` tag, so the response must stay a plain JS file.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tera::{Context, Tera};
use tracing::{error, warn};

use storebot_core::domain::chatbot::ChatbotId;
use storebot_db::repositories::{ChatbotRepository, SqlChatbotRepository};
use storebot_db::DbPool;

const WIDGET_TEMPLATE: &str = "widget.js";

#[derive(Clone)]
pub struct WidgetState {
    pub chatbots: Arc<dyn ChatbotRepository>,
    pub templates: Arc<Tera>,
    pub public_origin: String,
}

impl WidgetState {
    pub fn new(pool: &DbPool, public_origin: String) -> Self {
        Self {
            chatbots: Arc::new(SqlChatbotRepository::new(pool.clone())),
            templates: init_templates(),
            public_origin,
        }
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(err) =
        tera.add_raw_template(WIDGET_TEMPLATE, include_str!("../../../templates/widget.js"))
    {
        error!(error = %err, "embedded widget template failed to register");
    }
    Arc::new(tera)
}

pub fn router(state: WidgetState) -> Router {
    Router::new().route("/api/widget/{chatbot_id}", get(widget_script)).with_state(state)
}

pub async fn widget_script(
    State(state): State<WidgetState>,
    Path(chatbot_id): Path<String>,
) -> Response {
    let chatbot = match state.chatbots.find_active(&ChatbotId(chatbot_id)).await {
        Ok(Some(chatbot)) => chatbot,
        Ok(None) => return (StatusCode::NOT_FOUND, "widget unavailable").into_response(),
        Err(err) => {
            warn!(event_name = "widget.lookup_failed", error = %err, "chatbot lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "widget unavailable").into_response();
        }
    };

    let mut context = Context::new();
    context.insert("chatbot_id", &chatbot.id.0);
    context.insert("bot_name", &chatbot.name);
    context.insert("welcome_message", &chatbot.welcome_message);
    context.insert("widget_color", &chatbot.widget_color);
    context.insert("widget_position", chatbot.widget_position.as_str());
    context.insert("api_origin", &state.public_origin);

    match state.templates.render(WIDGET_TEMPLATE, &context) {
        Ok(script) => (
            [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
            script,
        )
            .into_response(),
        Err(err) => {
            error!(event_name = "widget.render_failed", error = %err, "widget template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "widget unavailable").into_response()
        }
    }
}
