//! The conversational turn pipeline.
//!
//! A turn moves through four stages, each owned by one component:
//!
//! 1. [`QuotaLedger`] — admits or blocks the turn against the user's
//!    daily interaction ceiling
//! 2. [`ContextAssembler`] — builds the persona system prompt from the
//!    profile, knowledge base, community posts, and recent history
//! 3. [`GenerationClient`] — calls the primary provider, falling back to
//!    the secondary on failure
//! 4. [`TurnOrchestrator`] — ties the stages together and guarantees
//!    exactly one bot message is appended per inbound user message
//!
//! [`TurnWorker`] drives the orchestrator from `MessageCreated` events on
//! the bus.

pub mod context;
pub mod generation;
pub mod orchestrator;
pub mod quota;
pub mod worker;

pub use context::{AssembledContext, ContextAssembler};
pub use generation::{GeneratedReply, GenerationClient, GenerationFailure, GenerationSettings};
pub use orchestrator::{TurnOrchestrator, TurnOutcome};
pub use quota::{QuotaDecision, QuotaLedger};
pub use worker::TurnWorker;
