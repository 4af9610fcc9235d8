//! End-to-end pipeline flow against the in-memory store.

use async_trait::async_trait;
use chrono::Utc;
use clara_core::error::ProviderError;
use clara_core::event::EventBus;
use clara_core::message::{Author, Conversation, ConversationId, StoredMessage};
use clara_core::profile::UserProfile;
use clara_core::provider::{ChatProvider, ChatReply, ChatRequest};
use clara_core::store::{ConversationStore, ProfileStore};
use clara_pipeline::{
    ContextAssembler, GenerationClient, GenerationSettings, QuotaLedger, TurnOrchestrator,
    TurnOutcome,
};
use clara_store::InMemoryStore;
use std::sync::{Arc, Mutex};

/// Echoes a canned reply and records the requests it saw.
struct RecordingProvider {
    reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl RecordingProvider {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatProvider for RecordingProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(ChatReply {
            text: self.reply.clone(),
            model: "test-model".into(),
        })
    }
}

fn orchestrator(
    store: Arc<InMemoryStore>,
    provider: Arc<RecordingProvider>,
) -> TurnOrchestrator {
    TurnOrchestrator::new(
        store.clone(),
        QuotaLedger::new(store.clone(), 15),
        ContextAssembler::new(store),
        GenerationClient::new(provider, None, GenerationSettings::default()),
        Arc::new(EventBus::default()),
    )
}

async fn seed_free_user(store: &Arc<InMemoryStore>, remaining: i64) -> ConversationId {
    let mut profile = UserProfile::new("u1", "Ana");
    profile.goals = Some("reduzir a ansiedade".into());
    profile.daily_interactions = remaining;
    profile.last_interaction_date = Some(Utc::now().date_naive());
    store.upsert_profile(profile).await.unwrap();

    let conv = Conversation::new("u1");
    let conv_id = conv.id.clone();
    store.create_conversation(conv).await.unwrap();
    conv_id
}

async fn send_user_message(
    store: &Arc<InMemoryStore>,
    conv_id: &ConversationId,
    text: &str,
) -> String {
    let msg = StoredMessage::user(conv_id.clone(), text);
    let id = msg.id.clone();
    store.append_message(msg).await.unwrap();
    id
}

#[tokio::test]
async fn last_interaction_replies_then_next_hits_quota() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(RecordingProvider::new(
        "Sinto muito que você esteja assim. Vamos respirar juntas?",
    ));
    let orchestrator = orchestrator(store.clone(), provider.clone());

    // One interaction left for today
    let conv_id = seed_free_user(&store, 1).await;

    let m1 = send_user_message(&store, &conv_id, "Estou ansioso hoje").await;
    let outcome = orchestrator
        .handle_turn(&conv_id, &m1, Author::User, "Estou ansioso hoje")
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied { .. }));

    // The prompt carried the profile, and the trigger was not in history
    let requests = provider.requests.lock().unwrap();
    let request = &requests[0];
    let system = request.system.as_deref().unwrap();
    assert!(system.contains("Ana"));
    assert!(system.contains("reduzir a ansiedade"));
    assert!(request.history.is_empty());
    assert_eq!(request.message, "Estou ansioso hoje");
    drop(requests);

    // The ceiling is now exhausted; the next turn gets the notice
    let m2 = send_user_message(&store, &conv_id, "E agora?").await;
    let outcome = orchestrator
        .handle_turn(&conv_id, &m2, Author::User, "E agora?")
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::QuotaNotice);

    // No extra provider call happened
    assert_eq!(provider.requests.lock().unwrap().len(), 1);

    // The conversation holds exactly two bot messages, one per turn
    let messages = store.recent_messages(&conv_id, 50).await.unwrap();
    let bot_messages: Vec<_> = messages.iter().filter(|m| m.author == Author::Bot).collect();
    assert_eq!(bot_messages.len(), 2);
    assert!(bot_messages[1].content.contains("limite diário"));
}

#[tokio::test]
async fn second_turn_sees_first_exchange_as_history() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(RecordingProvider::new("Claro, posso ajudar."));
    let orchestrator = orchestrator(store.clone(), provider.clone());

    let conv_id = seed_free_user(&store, 10).await;

    let m1 = send_user_message(&store, &conv_id, "Oi, Clara").await;
    orchestrator
        .handle_turn(&conv_id, &m1, Author::User, "Oi, Clara")
        .await
        .unwrap();

    let m2 = send_user_message(&store, &conv_id, "Me dá uma dica de sono?").await;
    orchestrator
        .handle_turn(&conv_id, &m2, Author::User, "Me dá uma dica de sono?")
        .await
        .unwrap();

    let requests = provider.requests.lock().unwrap();
    let second = &requests[1];
    // First user message and first bot reply, in order, trigger excluded
    assert_eq!(second.history.len(), 2);
    assert_eq!(second.history[0].text, "Oi, Clara");
    assert_eq!(second.history[1].text, "Claro, posso ajudar.");
}
