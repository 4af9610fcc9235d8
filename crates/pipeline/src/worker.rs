//! Turn worker — drives the orchestrator from the event bus.
//!
//! Subscribes to `MessageCreated` events and spawns one task per inbound
//! user message. The worker filters bot-authored events up front; the
//! orchestrator re-checks as its own invariant.

use crate::orchestrator::TurnOrchestrator;
use clara_core::event::{DomainEvent, EventBus};
use clara_core::message::{Author, ConversationId};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Listens for new messages and runs turns.
pub struct TurnWorker {
    orchestrator: Arc<TurnOrchestrator>,
    events: Arc<EventBus>,
}

impl TurnWorker {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, events: Arc<EventBus>) -> Self {
        Self {
            orchestrator,
            events,
        }
    }

    /// Run the event loop until the bus closes.
    pub async fn run(self) {
        let mut rx = self.events.subscribe();
        info!("Turn worker started");

        loop {
            match rx.recv().await {
                Ok(event) => self.dispatch(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Turn worker lagged behind the event bus");
                }
                Err(RecvError::Closed) => {
                    info!("Event bus closed; turn worker stopping");
                    break;
                }
            }
        }
    }

    fn dispatch(&self, event: Arc<DomainEvent>) {
        let DomainEvent::MessageCreated {
            conversation_id,
            message_id,
            author,
            content,
            ..
        } = event.as_ref()
        else {
            return;
        };

        if *author != Author::User {
            debug!(%conversation_id, "Ignoring non-user message event");
            return;
        }

        let orchestrator = self.orchestrator.clone();
        let conversation_id = ConversationId(conversation_id.clone());
        let message_id = message_id.clone();
        let content = content.clone();

        tokio::spawn(async move {
            if let Err(e) = orchestrator
                .handle_turn(&conversation_id, &message_id, Author::User, &content)
                .await
            {
                error!(%conversation_id, error = %e, "Turn ended without a bot message");
            }
        });
    }
}
