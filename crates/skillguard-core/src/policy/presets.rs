//! Built-in policy versions.
//!
//! The pattern lists are versioned configuration data. They disagree with each
//! other on purpose (e.g. `exploit` is only critical under `refined`), so callers
//! pick a preset explicitly instead of relying on one canonical list.

use std::{fmt, str::FromStr};

use anyhow::Result as AnyResult;
use serde::{Deserialize, Serialize};

use super::{
    CategorySet, CategorySpec, ConfigError, PatternPolicy, PolicyBundle, PolicyRepository,
    RiskTier, RuleSpec, TierSpec,
};

const COMPREHENSIVE_CRITICAL: &[&str] = &[
    "keylogger",
    "password.*steal",
    "credit.*card.*dump",
    "backdoor.*generator",
    "malware.*generator",
    "phish",
    "skimmer",
];

const COMPREHENSIVE_HIGH: &[&str] = &[
    "bypass.*captcha",
    "captcha.*solver",
    "evad.*detect",
    "anti.*detect.*browser",
    "bot.*detector.*evad",
    "ip.*rotat.*bypass",
];

const COMPREHENSIVE_MEDIUM: &[&str] = &[
    "stealth.*browser",
    "anti.*detect",
    "anonymous.*browse",
    "rotate.*vpn",
];

const REFINED_CRITICAL: &[&str] = &[
    "keylogger",
    "password.*steal",
    "credit.*card.*dump",
    "backdoor",
    "malware",
    "phish.*ing",
    "skimmer",
    "exploit",
];

const REFINED_HIGH: &[&str] = &[
    "bypass.*captcha",
    "captcha.*bypass",
    "captcha.*solver",
    "evade.*detect",
    "evad.*detect",
    "anti.*detect.*browser",
    "bot.*detector.*evad",
    "ip.*rotat.*bypass",
    "brute.*force",
    "403.*bypass",
];

const REFINED_MEDIUM: &[&str] = &[
    "stealth.*browser",
    "anonymous.*browser",
    "rotate.*vpn",
    "proxy.*bypass",
    "unblock.*proxy",
];

/// Unconditional removals, checked ahead of the high-risk list.
const LEGACY_REMOVE: &[&str] = &["keylogger", "steal.*credit.*card", "generate.*backdoor"];

const LEGACY_HIGH: &[&str] = &[
    "steal.*password",
    "credit.*card.*dump",
    "skimmer",
    "malware.*generator",
    "backdoor.*generator",
];

const LEGACY_MEDIUM: &[&str] = &[
    "bypass.*captcha",
    "captcha.*solver",
    "bot.*detector.*evad",
    "evasion.*technique",
    "anti.*detect",
];

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "security",
        &["security", "pentest", "vulnerability", "audit", "cve", "exploit"],
    ),
    (
        "crypto",
        &["crypto", "bitcoin", "ethereum", "web3", "defi", "nft", "trading"],
    ),
    (
        "bot",
        &["bot", "automation", "scraper", "crawler", "proxy", "captcha"],
    ),
    ("media", &["image", "video", "audio", "stream", "youtube"]),
    (
        "dev",
        &["github", "git", "docker", "kubernetes", "ci/cd", "build"],
    ),
];

/// Named policy versions shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    /// Name+description scanner of the markdown catalog.
    #[default]
    Comprehensive,
    /// Tighter path-oriented patterns used for tree listings.
    Refined,
    /// First-generation two-tier list.
    Legacy,
}

impl PresetName {
    pub const ALL: [PresetName; 3] = [Self::Comprehensive, Self::Refined, Self::Legacy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Refined => "refined",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: s.to_string(),
            })
    }
}

fn tier(tier: RiskTier, patterns: &[&str], label: impl Fn(&str) -> String) -> TierSpec {
    TierSpec {
        tier,
        rules: patterns
            .iter()
            .map(|pattern| RuleSpec::new(*pattern, label(*pattern)))
            .collect(),
    }
}

/// Declarative tiers for a preset.
pub fn tier_specs(preset: PresetName) -> Vec<TierSpec> {
    match preset {
        PresetName::Comprehensive => vec![
            tier(RiskTier::Critical, COMPREHENSIVE_CRITICAL, |p| {
                format!("Matches critical pattern: {p}")
            }),
            tier(RiskTier::High, COMPREHENSIVE_HIGH, |p| {
                format!("Matches high-risk pattern: {p}")
            }),
            tier(RiskTier::Medium, COMPREHENSIVE_MEDIUM, |p| {
                format!("Matches medium-risk pattern: {p}")
            }),
        ],
        PresetName::Refined => vec![
            tier(RiskTier::Critical, REFINED_CRITICAL, |p| format!("Critical: {p}")),
            tier(RiskTier::High, REFINED_HIGH, |p| format!("High: {p}")),
            tier(RiskTier::Medium, REFINED_MEDIUM, |p| format!("Medium: {p}")),
        ],
        PresetName::Legacy => {
            let mut high = tier(RiskTier::High, LEGACY_REMOVE, |p| format!("Remove: {p}"));
            high.rules.extend(
                tier(RiskTier::High, LEGACY_HIGH, |p| format!("High risk: {p}")).rules,
            );
            vec![
                high,
                tier(RiskTier::Medium, LEGACY_MEDIUM, |p| format!("Medium risk: {p}")),
            ]
        }
    }
}

/// Declarative form of the default topic categories.
pub fn category_specs() -> Vec<CategorySpec> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, patterns)| CategorySpec {
            name: (*name).to_string(),
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
        })
        .collect()
}

pub fn pattern_policy(preset: PresetName) -> Result<PatternPolicy, ConfigError> {
    PatternPolicy::new(preset.as_str(), tier_specs(preset))
}

pub fn default_categories() -> Result<CategorySet, ConfigError> {
    CategorySet::new(category_specs())
}

/// Repository serving one of the built-in presets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetRepository {
    preset: PresetName,
}

impl PresetRepository {
    pub fn new(preset: PresetName) -> Self {
        Self { preset }
    }
}

impl PolicyRepository for PresetRepository {
    fn load_policy(&self) -> AnyResult<PolicyBundle> {
        Ok(PolicyBundle {
            risk: pattern_policy(self.preset)?,
            categories: default_categories()?,
        })
    }
}
