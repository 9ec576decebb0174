use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{
    entry::Entry,
    policy::{PatternPolicy, RiskTier},
};

/// Outcome of classifying one entry: the tier and the label of the rule that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: RiskTier,
    pub reason: Option<String>,
}

impl Classification {
    pub fn unclassified() -> Self {
        Self {
            tier: RiskTier::Unclassified,
            reason: None,
        }
    }
}

/// Match `text` against the policy: tiers in priority order, rules in declaration
/// order, stopping at the first hit.
pub fn classify_text(text: &str, policy: &PatternPolicy) -> Classification {
    for tier in policy.tiers() {
        for rule in tier.rules() {
            if rule.is_match(text) {
                trace!(tier = %tier.tier(), pattern = rule.pattern(), "rule matched");
                return Classification {
                    tier: tier.tier(),
                    reason: Some(rule.label().to_string()),
                };
            }
        }
    }
    Classification::unclassified()
}

pub fn classify(entry: &Entry, policy: &PatternPolicy) -> Classification {
    classify_text(&entry.match_text(), policy)
}

/// Classify every entry and record the result on it.
#[instrument(name = "classify_entries", skip_all, fields(policy = policy.name(), entries = entries.len()))]
pub fn classify_all(entries: &mut [Entry], policy: &PatternPolicy) {
    let mut suspicious = 0usize;
    for entry in entries.iter_mut() {
        let Classification { tier, reason } = classify(entry, policy);
        if tier.is_suspicious() {
            suspicious += 1;
        }
        entry.set_risk(tier, reason);
    }
    debug!(suspicious, "classification completed");
}
