//! HTTP API gateway for Clara.
//!
//! Endpoints:
//!
//! - `GET  /health`  — liveness probe
//! - `POST /v1/chat` — send a message, get Dra. Clara's reply
//!
//! `/v1/chat` runs the turn pipeline inline: the caller's message is
//! persisted, the orchestrator produces the turn's single bot message,
//! and that message comes back in the response body. The event-driven
//! [`TurnWorker`] covers ingestion paths that append messages without
//! going through this endpoint.
//!
//! Built on Axum for high performance async HTTP.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use clara_config::AppConfig;
use clara_core::error::Error;
use clara_core::event::EventBus;
use clara_core::message::{Author, Conversation, ConversationId, StoredMessage};
use clara_core::store::{ConversationStore, DataStore};
use clara_pipeline::{
    ContextAssembler, GenerationClient, GenerationSettings, QuotaLedger, TurnOrchestrator,
    TurnWorker,
};
use clara_store::{InMemoryStore, SqliteStore};

/// Shared application state for the gateway.
pub struct GatewayState {
    /// Bearer token → user ID
    pub auth_tokens: HashMap<String, String>,
    pub store: Arc<dyn DataStore>,
    pub orchestrator: Arc<TurnOrchestrator>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the configured store backend.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn DataStore>, Error> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => Ok(Arc::new(SqliteStore::new(&config.store.path).await?)),
    }
}

/// Wire the turn pipeline from configuration.
pub fn build_orchestrator(
    config: &AppConfig,
    store: Arc<dyn DataStore>,
    events: Arc<EventBus>,
) -> Result<TurnOrchestrator, Error> {
    let primary = clara_providers::build_provider(&config.primary).ok_or_else(|| Error::Config {
        message: "No primary provider configured; set an API key".into(),
    })?;
    let fallback = clara_providers::build_provider(&config.fallback);
    if fallback.is_none() {
        warn!("No fallback provider configured; primary failures will be terminal");
    }

    let settings = GenerationSettings {
        primary_model: config
            .primary
            .model
            .clone()
            .unwrap_or_else(|| "gemini-1.5-flash".into()),
        fallback_model: config
            .fallback
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".into()),
        temperature: config.generation.temperature,
        max_tokens: config.generation.max_tokens,
        timeout: Duration::from_secs(config.generation.provider_timeout_secs),
    };

    Ok(TurnOrchestrator::new(
        store.clone(),
        QuotaLedger::new(store.clone(), config.quota.free_daily_limit),
        ContextAssembler::new(store)
            .with_system_prompt_override(config.persona.system_prompt_override.clone()),
        GenerationClient::new(primary, fallback, settings),
        events,
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(&config).await?;
    let events = Arc::new(EventBus::default());
    let orchestrator = Arc::new(build_orchestrator(&config, store.clone(), events.clone())?);

    // Covers message events from ingestion paths other than /v1/chat
    tokio::spawn(TurnWorker::new(orchestrator.clone(), events.clone()).run());

    let state = Arc::new(GatewayState {
        auth_tokens: config.gateway.auth_tokens.clone(),
        store,
        orchestrator,
    });

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatApiRequest {
    /// Existing conversation ID (omit to start a new conversation).
    #[serde(default)]
    conversation_id: Option<String>,

    /// The user's message.
    message: String,
}

#[derive(Serialize)]
struct ChatApiResponse {
    conversation_id: String,
    response: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, code: &'static str) -> ApiError {
    (status, Json(ErrorBody { error: code }))
}

async fn chat_handler(
    State(state): State<SharedState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<ChatApiRequest>,
) -> Result<Json<ChatApiResponse>, ApiError> {
    // Authentication: bearer token must map to a known user
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let user_id = token
        .and_then(|t| state.auth_tokens.get(t))
        .cloned()
        .ok_or_else(|| {
            warn!("Unauthenticated chat request");
            api_error(StatusCode::UNAUTHORIZED, "unauthenticated")
        })?;

    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid-argument"));
    }

    // Find or create the conversation, enforcing ownership
    let conversation = match &payload.conversation_id {
        Some(id) => {
            let conversation = state
                .store
                .get_conversation(&ConversationId::from(id))
                .await
                .map_err(|e| {
                    warn!(error = %e, "Conversation lookup failed");
                    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal")
                })?
                .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not-found"))?;
            if conversation.user_id != user_id {
                return Err(api_error(StatusCode::FORBIDDEN, "permission-denied"));
            }
            conversation
        }
        None => {
            let conversation = Conversation::new(&user_id);
            state
                .store
                .create_conversation(conversation.clone())
                .await
                .map_err(|e| {
                    warn!(error = %e, "Conversation create failed");
                    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal")
                })?;
            conversation
        }
    };
    let conversation_id = conversation.id;

    // Persist the user message, then run the turn inline
    let user_message = StoredMessage::user(conversation_id.clone(), message);
    let message_id = user_message.id.clone();
    state.store.append_message(user_message).await.map_err(|e| {
        warn!(error = %e, "User message persist failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal")
    })?;

    let outcome = state
        .orchestrator
        .handle_turn(&conversation_id, &message_id, Author::User, message)
        .await
        .map_err(|e| {
            warn!(%conversation_id, error = %e, "Turn failed without a bot message");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal")
        })?;

    // The outcome carries the turn's bot message; reading it back from the
    // store could race a concurrent turn in the same conversation.
    let response = outcome
        .reply_text()
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal"))?
        .to_string();

    Ok(Json(ChatApiResponse {
        conversation_id: conversation_id.to_string(),
        response,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use clara_core::error::ProviderError;
    use clara_core::profile::UserProfile;
    use clara_core::provider::{ChatProvider, ChatReply, ChatRequest};
    use clara_core::store::ProfileStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct StaticProvider(&'static str);

    #[async_trait]
    impl ChatProvider for StaticProvider {
        fn name(&self) -> &str {
            "gemini"
        }

        async fn generate(&self, _request: ChatRequest) -> Result<ChatReply, ProviderError> {
            Ok(ChatReply {
                text: self.0.into(),
                model: "test-model".into(),
            })
        }
    }

    async fn test_state(reply: &'static str) -> SharedState {
        let store = Arc::new(InMemoryStore::new());

        let mut profile = UserProfile::new("u1", "Ana");
        profile.daily_interactions = 5;
        profile.last_interaction_date = Some(Utc::now().date_naive());
        store.upsert_profile(profile).await.unwrap();

        let events = Arc::new(EventBus::default());
        let orchestrator = Arc::new(TurnOrchestrator::new(
            store.clone(),
            QuotaLedger::new(store.clone(), 15),
            ContextAssembler::new(store.clone()),
            GenerationClient::new(
                Arc::new(StaticProvider(reply)),
                None,
                GenerationSettings::default(),
            ),
            events,
        ));

        let mut auth_tokens = HashMap::new();
        auth_tokens.insert("token-abc".to_string(), "u1".to_string());

        Arc::new(GatewayState {
            auth_tokens,
            store,
            orchestrator,
        })
    }

    fn chat_request(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state("oi").await);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_without_token_is_unauthenticated() {
        let app = build_router(test_state("oi").await);
        let response = app
            .oneshot(chat_request(None, r#"{"message":"oi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unauthenticated");
    }

    #[tokio::test]
    async fn chat_with_unknown_token_is_unauthenticated() {
        let app = build_router(test_state("oi").await);
        let response = app
            .oneshot(chat_request(Some("wrong"), r#"{"message":"oi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_message_is_invalid_argument() {
        let app = build_router(test_state("oi").await);
        let response = app
            .oneshot(chat_request(Some("token-abc"), r#"{"message":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid-argument");
    }

    #[tokio::test]
    async fn chat_returns_reply_and_new_conversation() {
        let state = test_state("Olá, Ana! Como você está?").await;
        let app = build_router(state.clone());
        let response = app
            .oneshot(chat_request(Some("token-abc"), r#"{"message":"oi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["response"], "Olá, Ana! Como você está?");

        // The conversation exists and holds the user + bot messages
        let conv_id = ConversationId::from(json["conversation_id"].as_str().unwrap());
        let messages = state.store.recent_messages(&conv_id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].author, Author::User);
        assert_eq!(messages[1].author, Author::Bot);
    }

    #[tokio::test]
    async fn chat_continues_existing_conversation() {
        let state = test_state("resposta").await;

        let app = build_router(state.clone());
        let response = app
            .oneshot(chat_request(Some("token-abc"), r#"{"message":"primeira"}"#))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let conv_id = json["conversation_id"].as_str().unwrap().to_string();

        let app = build_router(state.clone());
        let body = format!(r#"{{"conversation_id":"{conv_id}","message":"segunda"}}"#);
        let response = app
            .oneshot(chat_request(Some("token-abc"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let messages = state
            .store
            .recent_messages(&ConversationId::from(&conv_id), 10)
            .await
            .unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn reply_comes_from_turn_outcome_not_store_tail() {
        let state = test_state("resposta deste turno").await;

        // An owned conversation already holding a bot message dated in the
        // future, as another in-flight turn could leave behind
        let conv = Conversation::new("u1");
        let conv_id = conv.id.clone();
        state.store.create_conversation(conv).await.unwrap();
        let mut decoy = StoredMessage::bot(conv_id.clone(), "resposta de outro turno");
        decoy.created_at = Utc::now() + chrono::Duration::hours(1);
        state.store.append_message(decoy).await.unwrap();

        let app = build_router(state);
        let body = format!(r#"{{"conversation_id":"{conv_id}","message":"oi"}}"#);
        let response = app
            .oneshot(chat_request(Some("token-abc"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["response"], "resposta deste turno");
    }

    #[tokio::test]
    async fn chat_rejects_foreign_conversation() {
        let state = test_state("resposta").await;

        // A conversation owned by someone else
        let foreign = Conversation::new("u2");
        let foreign_id = foreign.id.to_string();
        state.store.create_conversation(foreign).await.unwrap();

        let app = build_router(state);
        let body = format!(r#"{{"conversation_id":"{foreign_id}","message":"oi"}}"#);
        let response = app
            .oneshot(chat_request(Some("token-abc"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn chat_unknown_conversation_is_not_found() {
        let state = test_state("resposta").await;
        let app = build_router(state);
        let response = app
            .oneshot(chat_request(
                Some("token-abc"),
                r#"{"conversation_id":"ghost","message":"oi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exhausted_quota_returns_notice_in_response() {
        let state = test_state("nunca").await;
        let mut profile = UserProfile::new("u1", "Ana");
        profile.daily_interactions = 0;
        profile.last_interaction_date = Some(Utc::now().date_naive());
        state.store.upsert_profile(profile).await.unwrap();

        let app = build_router(state);
        let response = app
            .oneshot(chat_request(Some("token-abc"), r#"{"message":"oi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            json["response"]
                .as_str()
                .unwrap()
                .contains("limite diário")
        );
    }
}
