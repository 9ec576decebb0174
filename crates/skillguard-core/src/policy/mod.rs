use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::Result as AnyResult;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file_repository;
pub mod presets;

/// Label returned by the categorizer when no topic policy matches.
pub const DEFAULT_CATEGORY: &str = "general";

/// Risk severity assigned to a catalog entry.
///
/// Variants are declared in priority order, so the derived `Ord` sorts
/// `Critical` first and `Unclassified` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Critical,
    High,
    Medium,
    Low,
    Unclassified,
}

impl RiskTier {
    /// Tiers that may carry rules, highest priority first.
    pub const RANKED: [RiskTier; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unclassified => "unclassified",
        }
    }

    /// Collapse `Unclassified` onto `Low` for counting purposes.
    pub fn for_aggregation(self) -> Self {
        match self {
            Self::Unclassified => Self::Low,
            other => other,
        }
    }

    /// True for every tier strictly above `low`.
    pub fn is_suspicious(self) -> bool {
        matches!(self, Self::Critical | Self::High | Self::Medium)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "unclassified" => Ok(Self::Unclassified),
            other => Err(ConfigError::UnknownTier {
                name: other.to_string(),
            }),
        }
    }
}

/// Where inside a policy a configuration problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyScope {
    Tier(RiskTier),
    Category(String),
    LinkPattern,
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(tier) => write!(f, "tier `{tier}`"),
            Self::Category(name) => write!(f, "category `{name}`"),
            Self::LinkPattern => f.write_str("link pattern"),
        }
    }
}

/// Errors raised while building or loading a policy. A policy is never partially loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pattern `{pattern}` in {scope}: {source}")]
    InvalidPattern {
        scope: PolicyScope,
        pattern: String,
        source: regex::Error,
    },
    #[error("empty pattern in {scope}")]
    EmptyPattern { scope: PolicyScope },
    #[error("tier `{tier}` is declared more than once")]
    DuplicateTier { tier: RiskTier },
    #[error("tier `unclassified` cannot carry rules")]
    UnclassifiedTier,
    #[error("unknown risk tier `{name}`")]
    UnknownTier { name: String },
    #[error("category name must not be blank")]
    EmptyCategoryName,
    #[error("category `{name}` is declared more than once")]
    DuplicateCategory { name: String },
    #[error("unknown policy preset `{name}`")]
    UnknownPreset { name: String },
}

pub(crate) fn compile(
    pattern: &str,
    scope: impl FnOnce() -> PolicyScope,
) -> Result<Regex, ConfigError> {
    if pattern.trim().is_empty() {
        return Err(ConfigError::EmptyPattern { scope: scope() });
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            scope: scope(),
            pattern: pattern.to_string(),
            source,
        })
}

/// Declarative form of a single risk rule, as written in policy files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    /// Reason reported when the rule matches; derived from the pattern when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RuleSpec {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: Some(label.into()),
        }
    }
}

/// Declarative form of one risk tier and its ordered rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub tier: RiskTier,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Declarative form of a topic category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Compiled regex rule with the label reported on a match.
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    label: String,
}

impl PatternRule {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// One risk tier; rules are kept in declaration order.
#[derive(Debug, Clone)]
pub struct PatternTier {
    tier: RiskTier,
    rules: Vec<PatternRule>,
}

impl PatternTier {
    pub fn tier(&self) -> RiskTier {
        self.tier
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }
}

/// Immutable, ordered set of risk tiers used by the classifier.
#[derive(Debug, Clone)]
pub struct PatternPolicy {
    name: String,
    tiers: Vec<PatternTier>,
}

impl PatternPolicy {
    /// Compile a policy, sorting tiers into priority order.
    ///
    /// Fails on the first bad pattern; rules keep their declaration order within a tier.
    pub fn new(name: impl Into<String>, specs: Vec<TierSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut tiers = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.tier == RiskTier::Unclassified {
                return Err(ConfigError::UnclassifiedTier);
            }
            if !seen.insert(spec.tier) {
                return Err(ConfigError::DuplicateTier { tier: spec.tier });
            }
            let mut rules = Vec::with_capacity(spec.rules.len());
            for rule in spec.rules {
                let regex = compile(&rule.pattern, || PolicyScope::Tier(spec.tier))?;
                let label = rule
                    .label
                    .filter(|label| !label.trim().is_empty())
                    .unwrap_or_else(|| format!("Matches {} pattern: {}", spec.tier, rule.pattern));
                rules.push(PatternRule { regex, label });
            }
            tiers.push(PatternTier {
                tier: spec.tier,
                rules,
            });
        }
        tiers.sort_by_key(|tier| tier.tier);
        Ok(Self {
            name: name.into(),
            tiers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tiers in strict priority order, critical first.
    pub fn tiers(&self) -> &[PatternTier] {
        &self.tiers
    }

    pub fn rule_count(&self) -> usize {
        self.tiers.iter().map(|tier| tier.rules.len()).sum()
    }

    /// Declarative view of the compiled policy, e.g. for listing or re-serialising.
    pub fn to_specs(&self) -> Vec<TierSpec> {
        self.tiers
            .iter()
            .map(|tier| TierSpec {
                tier: tier.tier,
                rules: tier
                    .rules
                    .iter()
                    .map(|rule| RuleSpec::new(rule.pattern(), rule.label()))
                    .collect(),
            })
            .collect()
    }
}

/// A named topic; matches when any of its patterns matches.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    name: String,
    rules: Vec<Regex>,
}

impl CategoryPolicy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(text))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Regex::as_str)
    }
}

/// Unordered collection of topic categories.
#[derive(Debug, Clone, Default)]
pub struct CategorySet {
    categories: Vec<CategoryPolicy>,
}

impl CategorySet {
    pub fn new(specs: Vec<CategorySpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateCategory { name });
            }
            let rules = spec
                .patterns
                .iter()
                .map(|pattern| compile(pattern, || PolicyScope::Category(name.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            categories.push(CategoryPolicy { name, rules });
        }
        Ok(Self { categories })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryPolicy> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Risk policy and category set loaded together from one source.
#[derive(Debug, Clone)]
pub struct PolicyBundle {
    pub risk: PatternPolicy,
    pub categories: CategorySet,
}

/// Abstraction over policy loading so presets and policy files can be swapped transparently.
pub trait PolicyRepository: Send + Sync {
    /// Retrieve the compiled policy bundle.
    fn load_policy(&self) -> AnyResult<PolicyBundle>;
}
