//! Quota ledger — daily interaction admission control.
//!
//! Each inbound user message consumes exactly one interaction. The
//! counter is reset lazily: the first consumption on a new calendar day
//! (or for a profile that never interacted) sets it back to the ceiling
//! before decrementing. Premium/enterprise plans and admins still
//! decrement against an effectively unlimited ceiling, so usage stays
//! observable without ever blocking them.
//!
//! The ledger fails open: a store error admits the turn rather than
//! silencing the assistant over an infrastructure hiccup.

use clara_core::profile::UserProfile;
use clara_core::store::ProfileStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Daily ceiling for plans without a real limit. Large enough to never
/// block, small enough to keep the counter meaningful.
pub const UNLIMITED_CEILING: i64 = 1_000_000;

/// Outcome of a quota admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The turn may proceed. `remaining` is `None` when no profile exists
    /// or the user is exempt from enforcement.
    Allowed { remaining: Option<i64> },

    /// The free-plan ceiling is exhausted for today.
    Blocked,
}

impl QuotaDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, QuotaDecision::Blocked)
    }
}

/// Admission control against the per-user daily interaction ceiling.
pub struct QuotaLedger {
    store: Arc<dyn ProfileStore>,
    free_daily_limit: i64,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn ProfileStore>, free_daily_limit: i64) -> Self {
        Self {
            store,
            free_daily_limit,
        }
    }

    /// Check and consume one interaction for `user_id` on `today`.
    ///
    /// `profile` is the already-loaded profile (or `None` when the user
    /// has none — such turns are admitted untracked).
    pub async fn check_and_consume(
        &self,
        user_id: &str,
        profile: Option<&UserProfile>,
        today: NaiveDate,
    ) -> QuotaDecision {
        let Some(profile) = profile else {
            debug!(user_id, "No profile on record; admitting turn untracked");
            return QuotaDecision::Allowed { remaining: None };
        };

        let enforce = !profile.quota_exempt();
        let ceiling = if enforce {
            self.free_daily_limit
        } else {
            UNLIMITED_CEILING
        };

        match self
            .store
            .consume_interaction(user_id, today, ceiling, enforce)
            .await
        {
            Ok(Some(outcome)) if !outcome.allowed => {
                debug!(user_id, "Daily interaction ceiling reached");
                QuotaDecision::Blocked
            }
            Ok(Some(outcome)) => QuotaDecision::Allowed {
                remaining: enforce.then_some(outcome.remaining),
            },
            Ok(None) => QuotaDecision::Allowed { remaining: None },
            Err(e) => {
                // Fail open: a broken ledger must not mute the assistant
                warn!(user_id, error = %e, "Quota check failed; admitting turn");
                QuotaDecision::Allowed { remaining: None }
            }
        }
    }
}
