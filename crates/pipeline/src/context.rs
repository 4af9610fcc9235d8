//! Context assembler — builds the persona prompt and seeded history.
//!
//! Every context source degrades independently: a failed read is logged
//! and its section is simply omitted, so a broken knowledge base never
//! blocks a reply. The trigger message itself is excluded from history
//! (it travels separately as the current message).

use clara_core::knowledge::{CommunityPost, KnowledgeDocument};
use clara_core::message::{Author, ConversationId, StoredMessage};
use clara_core::profile::UserProfile;
use clara_core::provider::ChatTurn;
use clara_core::store::{
    CommunityStore, ConversationStore, DataStore, KnowledgeStore, ProfileStore,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// At most this many knowledge documents are injected per turn.
pub const MAX_KNOWLEDGE_DOCS: usize = 3;

/// At most this many prior turns seed the chat session.
pub const MAX_HISTORY_TURNS: usize = 15;

/// At most this many of the user's community posts are considered.
pub const MAX_COMMUNITY_POSTS: usize = 5;

/// The built-in Dra. Clara persona.
const DEFAULT_PERSONA: &str = "\
Você é a Dra. Clara, uma assistente de bem-estar acolhedora e empática. \
Você conversa em português brasileiro, com tom caloroso e acessível. \
Você oferece orientações práticas de bem-estar, escuta ativa e acolhimento \
emocional. Você não faz diagnósticos médicos nem prescreve medicamentos; \
quando o assunto exigir um profissional de saúde, recomende buscar um. \
Responda de forma concisa e pessoal, usando o que souber sobre a pessoa.";

/// The fully assembled inputs for one generation call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Persona + profile + knowledge + community, ready for the provider
    pub system_prompt: String,

    /// Prior turns in chronological order, trigger excluded
    pub history: Vec<ChatTurn>,
}

/// Assembles per-turn context from the data store.
pub struct ContextAssembler {
    store: Arc<dyn DataStore>,
    system_prompt_override: Option<String>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            system_prompt_override: None,
        }
    }

    /// Replace the built-in persona prompt entirely.
    pub fn with_system_prompt_override(mut self, prompt: Option<String>) -> Self {
        self.system_prompt_override = prompt;
        self
    }

    /// Assemble the context for one turn.
    ///
    /// `trigger_message_id` is the inbound user message that started the
    /// turn; it is filtered out of the seeded history.
    pub async fn assemble(
        &self,
        user_id: &str,
        conversation_id: &ConversationId,
        trigger_message_id: &str,
    ) -> AssembledContext {
        let (profile, documents, posts, messages) = tokio::join!(
            self.store.get_profile(user_id),
            self.store.active_documents(MAX_KNOWLEDGE_DOCS),
            self.store.recent_posts_by(user_id, MAX_COMMUNITY_POSTS),
            // Over-fetch by one so dropping the trigger still yields a
            // full window
            self.store
                .recent_messages(conversation_id, MAX_HISTORY_TURNS + 1),
        );

        let profile = profile.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Profile read failed; assembling without it");
            None
        });
        let documents = documents.unwrap_or_else(|e| {
            warn!(error = %e, "Knowledge base read failed; assembling without it");
            Vec::new()
        });
        let posts = posts.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Community read failed; assembling without it");
            Vec::new()
        });
        let messages = messages.unwrap_or_else(|e| {
            warn!(%conversation_id, error = %e, "History read failed; assembling without it");
            Vec::new()
        });

        let history = to_history(messages, trigger_message_id);
        let system_prompt = self.build_system_prompt(profile.as_ref(), &documents, &posts);

        debug!(
            user_id,
            history_turns = history.len(),
            documents = documents.len(),
            posts = posts.len(),
            "Context assembled"
        );

        AssembledContext {
            system_prompt,
            history,
        }
    }

    fn build_system_prompt(
        &self,
        profile: Option<&UserProfile>,
        documents: &[KnowledgeDocument],
        posts: &[CommunityPost],
    ) -> String {
        let persona = self
            .system_prompt_override
            .as_deref()
            .unwrap_or(DEFAULT_PERSONA);

        let mut prompt = String::from(persona);

        if let Some(profile) = profile {
            prompt.push_str("\n\n## Perfil da pessoa\n");
            prompt.push_str(&format!("- Nome: {}\n", profile.name));
            prompt.push_str(&format!(
                "- Idade: {}\n",
                profile
                    .age
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "não informada".into())
            ));
            prompt.push_str(&format!(
                "- Profissão: {}\n",
                profile.profession.as_deref().unwrap_or("não informada")
            ));
            prompt.push_str(&format!(
                "- Objetivos de bem-estar: {}\n",
                profile.goals.as_deref().unwrap_or("não informados")
            ));
        }

        if !documents.is_empty() {
            prompt.push_str("\n## Base de conhecimento\n");
            prompt.push_str(
                "Use o material abaixo quando for relevante para a conversa:\n\n",
            );
            let rendered: Vec<String> = documents
                .iter()
                .map(|doc| format!("### {}\n{}\n\n{}", doc.title, doc.summary, doc.content))
                .collect();
            prompt.push_str(&rendered.join("\n---\n"));
            prompt.push('\n');
        }

        if !posts.is_empty() {
            prompt.push_str("\n## Publicações recentes da pessoa na comunidade\n");
            prompt.push_str(
                "Use apenas para entender o momento da pessoa; nunca cite ou mencione \
                 estas publicações diretamente:\n",
            );
            for post in posts {
                prompt.push_str(&format!("- {}\n", post.content));
            }
        }

        prompt
    }
}

/// Map stored messages to provider turns, dropping the trigger message.
///
/// Leading bot turns are trimmed — Gemini rejects a history that opens
/// with a model turn.
fn to_history(messages: Vec<StoredMessage>, trigger_message_id: &str) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = messages
        .into_iter()
        .filter(|m| m.id != trigger_message_id)
        .map(|m| match m.author {
            Author::User => ChatTurn::user(m.content),
            Author::Bot => ChatTurn::model(m.content),
        })
        .collect();

    if turns.len() > MAX_HISTORY_TURNS {
        turns.drain(..turns.len() - MAX_HISTORY_TURNS);
    }

    let leading_bot = turns
        .iter()
        .take_while(|t| t.role == clara_core::provider::TurnRole::Model)
        .count();
    turns.drain(..leading_bot);

    turns
}
