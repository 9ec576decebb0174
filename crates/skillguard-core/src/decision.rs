use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{entry::Entry, policy::RiskTier};

/// What the rewriter does with a document line that links to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Keep,
    Remove,
    Flag,
}

/// Tier → action table. Tiers missing from the table map to `Keep`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionPolicy {
    actions: BTreeMap<RiskTier, Action>,
}

impl DecisionPolicy {
    pub fn new(actions: impl IntoIterator<Item = (RiskTier, Action)>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }

    /// Critical and high are removed, medium is flagged.
    pub fn strict() -> Self {
        Self::new([
            (RiskTier::Critical, Action::Remove),
            (RiskTier::High, Action::Remove),
            (RiskTier::Medium, Action::Flag),
        ])
    }

    /// Only high is removed and medium flagged; critical entries are left for manual review.
    pub fn high_only() -> Self {
        Self::new([
            (RiskTier::High, Action::Remove),
            (RiskTier::Medium, Action::Flag),
        ])
    }

    pub fn action_for(&self, tier: RiskTier) -> Action {
        self.actions.get(&tier).copied().unwrap_or_default()
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Identifier → action lookup consumed by the rewriter.
#[derive(Debug, Clone, Default)]
pub struct DecisionMap {
    actions: HashMap<String, Action>,
}

impl DecisionMap {
    /// Build from classified entries; the first entry seen for a key decides.
    pub fn from_entries<'a, I>(entries: I, policy: &DecisionPolicy) -> Self
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let mut map = Self::default();
        for entry in entries {
            map.insert(entry.decision_key(), policy.action_for(entry.risk_tier()));
        }
        map
    }

    /// Record an action unless the key already has one. Returns whether it was recorded.
    pub fn insert(&mut self, key: impl Into<String>, action: Action) -> bool {
        let key = key.into();
        if self.actions.contains_key(&key) {
            trace!(%key, "decision already recorded; keeping first");
            return false;
        }
        self.actions.insert(key, action);
        true
    }

    pub fn action(&self, key: &str) -> Action {
        self.actions.get(key).copied().unwrap_or_default()
    }

    pub fn count(&self, action: Action) -> usize {
        self.actions.values().filter(|a| **a == action).count()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
