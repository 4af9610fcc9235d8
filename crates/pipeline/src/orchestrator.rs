//! Turn orchestrator — one inbound user message in, exactly one bot
//! message out.
//!
//! Every admitted turn ends with a single bot message appended to the
//! conversation, whichever branch it takes:
//! - quota exhausted → the quota notice
//! - generation succeeded → the reply
//! - both providers failed → the apology
//!
//! Bot-authored triggers are skipped outright, so the orchestrator can
//! never feed on its own output. Provider errors are logged in full but
//! never leak into user-visible text.

use crate::context::ContextAssembler;
use crate::generation::GenerationClient;
use crate::quota::{QuotaDecision, QuotaLedger};
use clara_core::error::{Error, Result};
use clara_core::event::{DomainEvent, EventBus};
use clara_core::message::{Author, ConversationId, StoredMessage};
use clara_core::store::{ConversationStore, DataStore, ProfileStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shown when the free-plan daily ceiling is exhausted.
pub const QUOTA_NOTICE_MESSAGE: &str = "\
Você atingiu o limite diário de interações do plano gratuito. 💙 \
Volte amanhã para continuarmos nossa conversa, ou conheça o plano \
premium para conversas sem limite.";

/// Shown when both providers failed. Deliberately generic — provider
/// errors go to the logs, never to the user.
pub const APOLOGY_MESSAGE: &str = "\
Desculpe, estou com uma dificuldade técnica neste momento. 💙 \
Por favor, tente novamente em alguns instantes.";

/// How a turn concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The trigger was not an inbound user message
    Skipped,

    /// Quota exhausted; the quota notice was appended
    QuotaNotice,

    /// A reply was generated and appended
    Replied { provider: String, text: String },

    /// Both providers failed; the apology was appended
    Apology,
}

impl TurnOutcome {
    /// The bot message this outcome appended, if any.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            TurnOutcome::Skipped => None,
            TurnOutcome::QuotaNotice => Some(QUOTA_NOTICE_MESSAGE),
            TurnOutcome::Replied { text, .. } => Some(text),
            TurnOutcome::Apology => Some(APOLOGY_MESSAGE),
        }
    }
}

/// Drives one conversational turn end to end.
pub struct TurnOrchestrator {
    store: Arc<dyn DataStore>,
    quota: QuotaLedger,
    context: ContextAssembler,
    generation: GenerationClient,
    events: Arc<EventBus>,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn DataStore>,
        quota: QuotaLedger,
        context: ContextAssembler,
        generation: GenerationClient,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            quota,
            context,
            generation,
            events,
        }
    }

    /// Handle one message-created trigger.
    ///
    /// Returns `Err` only when the bot message could not be persisted
    /// after a retry — every other failure resolves to a bot message.
    pub async fn handle_turn(
        &self,
        conversation_id: &ConversationId,
        message_id: &str,
        author: Author,
        content: &str,
    ) -> Result<TurnOutcome> {
        if author == Author::Bot {
            debug!(%conversation_id, "Bot-authored trigger; skipping");
            return Ok(TurnOutcome::Skipped);
        }

        let Some(conversation) = self.store.get_conversation(conversation_id).await? else {
            warn!(%conversation_id, "Trigger for unknown conversation; skipping");
            return Ok(TurnOutcome::Skipped);
        };
        let user_id = conversation.user_id;

        let profile = match self.store.get_profile(&user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id, error = %e, "Profile read failed; proceeding without it");
                None
            }
        };

        let today = Utc::now().date_naive();
        let decision = self
            .quota
            .check_and_consume(&user_id, profile.as_ref(), today)
            .await;

        if decision == QuotaDecision::Blocked {
            info!(user_id, %conversation_id, "Turn blocked by quota");
            self.persist_bot_message(conversation_id, QUOTA_NOTICE_MESSAGE)
                .await?;
            self.events.publish(DomainEvent::QuotaBlocked {
                user_id,
                timestamp: Utc::now(),
            });
            return Ok(TurnOutcome::QuotaNotice);
        }

        let context = self
            .context
            .assemble(&user_id, conversation_id, message_id)
            .await;

        match self.generation.generate(&context, content).await {
            Ok(reply) => {
                self.persist_bot_message(conversation_id, &reply.text)
                    .await?;
                self.events.publish(DomainEvent::ReplyGenerated {
                    conversation_id: conversation_id.to_string(),
                    provider: reply.provider.clone(),
                    timestamp: Utc::now(),
                });
                Ok(TurnOutcome::Replied {
                    provider: reply.provider,
                    text: reply.text,
                })
            }
            Err(failure) => {
                error!(
                    %conversation_id,
                    primary_error = %failure.primary_error,
                    fallback_error = ?failure.fallback_error,
                    "All providers failed; replying with apology"
                );
                self.persist_bot_message(conversation_id, APOLOGY_MESSAGE)
                    .await?;
                self.events.publish(DomainEvent::TurnFailed {
                    conversation_id: conversation_id.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(TurnOutcome::Apology)
            }
        }
    }

    /// Append the turn's single bot message, retrying once.
    async fn persist_bot_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<()> {
        let message = StoredMessage::bot(conversation_id.clone(), text);
        if let Err(first) = self.store.append_message(message.clone()).await {
            warn!(%conversation_id, error = %first, "Bot message persist failed; retrying once");
            self.store
                .append_message(message)
                .await
                .map_err(Error::Store)?;
        }
        Ok(())
    }
}
