//! User profile and subscription plan types.
//!
//! The profile carries the per-user daily interaction counter that the
//! quota ledger mutates — exactly once per inbound user message. All other
//! fields are read-only from the pipeline's perspective.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Subscription plan tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Premium,
    Enterprise,
}

impl Plan {
    /// Whether this plan is exempt from the daily interaction ceiling.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Plan::Premium | Plan::Enterprise)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(format!("unknown plan: {other}")),
        }
    }
}

/// A user profile record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique user ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Age in years, if shared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    /// Profession, if shared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,

    /// Free-text wellness goals, if shared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,

    /// Subscription plan
    #[serde(default)]
    pub plan: Plan,

    /// Administrators bypass the quota ceiling regardless of plan
    #[serde(default)]
    pub admin: bool,

    /// Remaining interactions for the current calendar day
    #[serde(default)]
    pub daily_interactions: i64,

    /// The calendar day `daily_interactions` applies to.
    /// `None` until the first message ever — triggers a lazy reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_date: Option<NaiveDate>,
}

impl UserProfile {
    /// Create a minimal profile with quota fields unset.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age: None,
            profession: None,
            goals: None,
            plan: Plan::Free,
            admin: false,
            daily_interactions: 0,
            last_interaction_date: None,
        }
    }

    /// Whether this user is exempt from quota enforcement.
    pub fn quota_exempt(&self) -> bool {
        self.admin || self.plan.is_unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_is_limited() {
        let profile = UserProfile::new("u1", "Ana");
        assert_eq!(profile.plan, Plan::Free);
        assert!(!profile.quota_exempt());
    }

    #[test]
    fn premium_and_admin_are_exempt() {
        let mut profile = UserProfile::new("u1", "Ana");
        profile.plan = Plan::Premium;
        assert!(profile.quota_exempt());

        let mut admin = UserProfile::new("u2", "Bruno");
        admin.admin = true;
        assert!(admin.quota_exempt());
    }

    #[test]
    fn plan_serde_is_lowercase() {
        let json = serde_json::to_string(&Plan::Enterprise).unwrap();
        assert_eq!(json, "\"enterprise\"");
        let parsed: Plan = serde_json::from_str("\"premium\"").unwrap();
        assert_eq!(parsed, Plan::Premium);
    }

    #[test]
    fn profile_roundtrip_keeps_quota_fields() {
        let mut profile = UserProfile::new("u1", "Ana");
        profile.daily_interactions = 7;
        profile.last_interaction_date = NaiveDate::from_ymd_opt(2026, 8, 30);

        let json = serde_json::to_string(&profile).unwrap();
        let parsed: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.daily_interactions, 7);
        assert_eq!(parsed.last_interaction_date, profile.last_interaction_date);
    }
}
