//! Retention actions from ranked attributions
//!
//! Rules match by case-insensitive substring against the space-joined
//! feature names of the attributions, so a key can match across two
//! adjacent names. Output keeps rule-table order, drops repeated texts and
//! is truncated last. The default list is used only when no rule matched.

use crate::explain::Attribution;
use std::collections::HashSet;

/// A trigger-key set and the action it recommends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRule {
    pub trigger_keys: &'static [&'static str],
    pub action: &'static str,
}

/// Rule table in priority order
pub const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        trigger_keys: &["MonthlyCharges", "Fiber optic"],
        action: "Offer limited-time discount or bundle to reduce bill shock.",
    },
    ActionRule {
        trigger_keys: &["Contract_Month-to-month", "Contract"],
        action: "Incentivize annual contract with loyalty credits.",
    },
    ActionRule {
        trigger_keys: &["PaymentMethod_Electronic check", "PaymentMethod"],
        action: "Promote auto-pay with a small bill credit.",
    },
    ActionRule {
        trigger_keys: &["tenure", "SeniorCitizen"],
        action: "Proactive outreach and onboarding tips.",
    },
    ActionRule {
        trigger_keys: &["TechSupport_No"],
        action: "Offer priority tech support or a free service call.",
    },
    ActionRule {
        trigger_keys: &["OnlineSecurity_No"],
        action: "Bundle security/backup at a promo price to increase stickiness.",
    },
    ActionRule {
        trigger_keys: &["PaperlessBilling_Yes"],
        action: "Send bill clarity tips and usage summaries.",
    },
];

/// Used when no rule matches
pub const DEFAULT_ACTIONS: [&str; 3] = [
    "Send personalized retention offer based on usage and tenure.",
    "Invite to a short satisfaction survey and follow up.",
    "Enroll in a loyalty program with milestone rewards.",
];

/// Recommend up to `top_k` actions using the built-in rule table
pub fn recommend(attributions: &[Attribution], top_k: usize) -> Vec<String> {
    recommend_with(ACTION_RULES, attributions, top_k)
}

/// Recommend up to `top_k` actions using a caller-supplied rule table
pub fn recommend_with(rules: &[ActionRule], attributions: &[Attribution], top_k: usize) -> Vec<String> {
    let haystack = attributions
        .iter()
        .map(|a| a.feature.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut candidates: Vec<&str> = rules
        .iter()
        .filter(|rule| {
            rule.trigger_keys
                .iter()
                .any(|key| haystack.contains(&key.to_lowercase()))
        })
        .map(|rule| rule.action)
        .collect();

    if candidates.is_empty() {
        candidates = DEFAULT_ACTIONS.to_vec();
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|action| seen.insert(*action))
        .take(top_k)
        .map(str::to_string)
        .collect()
}
