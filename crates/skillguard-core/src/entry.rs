use serde::{Deserialize, Serialize};

use crate::policy::RiskTier;

/// Which catalog shape an entry was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    MarkdownList,
    PathTree,
}

/// A single catalog skill. The identifier is fixed at construction; only the
/// risk fields change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    identifier: String,
    display_name: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    origin: EntryOrigin,
    risk_tier: RiskTier,
    risk_reason: Option<String>,
}

impl Entry {
    /// Entry from a markdown list line; the link URL is the identifier.
    pub fn listed(
        display_name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        topic_hint: Option<String>,
    ) -> Self {
        let url = url.into();
        Self {
            identifier: url.clone(),
            display_name: display_name.into(),
            description: description.into(),
            topic_hint,
            url: Some(url),
            origin: EntryOrigin::MarkdownList,
            risk_tier: RiskTier::Unclassified,
            risk_reason: None,
        }
    }

    /// Entry from a catalog path such as `skills/web/scraper-bot`.
    pub fn from_path(path: impl Into<String>, url: Option<String>) -> Self {
        let identifier = path.into();
        let display_name = identifier
            .rsplit('/')
            .next()
            .unwrap_or(identifier.as_str())
            .to_string();
        Self {
            identifier,
            display_name,
            description: String::new(),
            topic_hint: None,
            url,
            origin: EntryOrigin::PathTree,
            risk_tier: RiskTier::Unclassified,
            risk_reason: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn topic_hint(&self) -> Option<&str> {
        self.topic_hint.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    pub fn risk_reason(&self) -> Option<&str> {
        self.risk_reason.as_deref()
    }

    /// Text the pattern policies are matched against.
    ///
    /// Path-tree entries have no description, so the catalog path stands in.
    pub fn match_text(&self) -> String {
        match self.origin {
            EntryOrigin::MarkdownList => format!("{} {}", self.display_name, self.description),
            EntryOrigin::PathTree => self.identifier.clone(),
        }
    }

    /// Key used to join rewrite decisions with document lines.
    pub fn decision_key(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.identifier)
    }

    pub(crate) fn set_risk(&mut self, tier: RiskTier, reason: Option<String>) {
        self.risk_tier = tier;
        self.risk_reason = reason;
    }
}
