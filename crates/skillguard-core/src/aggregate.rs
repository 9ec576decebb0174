use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
};

use serde::{Deserialize, Serialize};

use crate::{
    categorize::categorize,
    classify::classify_all,
    entry::Entry,
    policy::{PolicyBundle, RiskTier},
};

/// An entry after classification together with its topic labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub entry: Entry,
    pub categories: BTreeSet<String>,
}

/// Classify and categorize entries in one pass, preserving their order.
pub fn assess(mut entries: Vec<Entry>, policy: &PolicyBundle) -> Vec<Assessment> {
    classify_all(&mut entries, &policy.risk);
    entries
        .into_iter()
        .map(|entry| {
            let categories = categorize(&entry, &policy.categories);
            Assessment { entry, categories }
        })
        .collect()
}

/// Counts by tier and category plus the names listed under every tier above `low`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub suspicious: usize,
    /// All four ranked tiers are always present; unclassified entries count as `low`.
    pub by_risk_tier: BTreeMap<RiskTier, usize>,
    /// Only categories that occur at least once.
    pub by_category: BTreeMap<String, usize>,
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
}

impl Summary {
    /// Fold assessments into counts. Names keep input order within each tier.
    pub fn from_assessments<'a, I>(assessments: I) -> Self
    where
        I: IntoIterator<Item = &'a Assessment>,
    {
        let mut summary = Self {
            total: 0,
            suspicious: 0,
            by_risk_tier: RiskTier::RANKED.iter().map(|tier| (*tier, 0)).collect(),
            by_category: BTreeMap::new(),
            critical: Vec::new(),
            high: Vec::new(),
            medium: Vec::new(),
        };

        for assessment in assessments {
            let entry = &assessment.entry;
            let tier = entry.risk_tier().for_aggregation();
            summary.total += 1;
            *summary.by_risk_tier.entry(tier).or_default() += 1;
            for category in &assessment.categories {
                *summary.by_category.entry(category.clone()).or_default() += 1;
            }
            let name = entry.display_name().to_string();
            match tier {
                RiskTier::Critical => summary.critical.push(name),
                RiskTier::High => summary.high.push(name),
                RiskTier::Medium => summary.medium.push(name),
                RiskTier::Low | RiskTier::Unclassified => continue,
            }
            summary.suspicious += 1;
        }
        summary
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        self.by_risk_tier
            .get(&tier.for_aggregation())
            .copied()
            .unwrap_or_default()
    }

    /// Categories by descending count, ties by name. For display only.
    pub fn categories_by_count(&self) -> Vec<(&str, usize)> {
        let mut categories: Vec<_> = self
            .by_category
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        categories.sort_by_key(|(name, count)| (Reverse(*count), *name));
        categories
    }

    pub fn suspicious_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.suspicious as f64 / self.total as f64
    }
}

/// Entries above `low`, in input order, for the suspicious-skills dump.
pub fn suspicious_entries<'a, I>(assessments: I) -> Vec<&'a Entry>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    assessments
        .into_iter()
        .map(|assessment| &assessment.entry)
        .filter(|entry| entry.risk_tier().is_suspicious())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::presets::{PresetName, PresetRepository};
    use crate::policy::PolicyRepository;

    fn sample() -> Vec<Assessment> {
        let policy = PresetRepository::new(PresetName::Comprehensive)
            .load_policy()
            .unwrap();
        let entries = vec![
            Entry::listed("Keylogger Pro", "https://e.x/1", "logs keystrokes", None),
            Entry::listed("Weather", "https://e.x/2", "daily forecast", None),
            Entry::listed("CAPTCHA Bypass Tool", "https://e.x/3", "solves captchas", None),
            Entry::listed("Stealth Browser", "https://e.x/4", "headless", None),
            Entry::listed("Phish Kit", "https://e.x/5", "email campaigns", None),
        ];
        assess(entries, &policy)
    }

    #[test]
    fn counts_every_tier_and_lists_names() {
        let summary = Summary::from_assessments(&sample());
        assert_eq!(summary.total, 5);
        assert_eq!(summary.suspicious, 4);
        assert_eq!(summary.count(RiskTier::Critical), 2);
        assert_eq!(summary.count(RiskTier::High), 1);
        assert_eq!(summary.count(RiskTier::Medium), 1);
        assert_eq!(summary.count(RiskTier::Low), 1);
        assert_eq!(summary.by_risk_tier.len(), 4);
        assert_eq!(summary.critical, vec!["Keylogger Pro", "Phish Kit"]);
        assert_eq!(summary.high, vec!["CAPTCHA Bypass Tool"]);
        assert_eq!(summary.medium, vec!["Stealth Browser"]);
    }

    #[test]
    fn empty_input_keeps_zero_tiers_and_omits_categories() {
        let summary = Summary::from_assessments(&Vec::<Assessment>::new());
        assert_eq!(summary.total, 0);
        assert!(summary.by_risk_tier.values().all(|count| *count == 0));
        assert_eq!(summary.by_risk_tier.len(), 4);
        assert!(summary.by_category.is_empty());
        assert_eq!(summary.suspicious_ratio(), 0.0);
    }

    #[test]
    fn counts_are_order_independent() {
        let assessments = sample();
        let forward = Summary::from_assessments(&assessments);
        let reversed = Summary::from_assessments(assessments.iter().rev());
        assert_eq!(forward.by_risk_tier, reversed.by_risk_tier);
        assert_eq!(forward.by_category, reversed.by_category);
        assert_eq!(forward.total, reversed.total);
    }

    #[test]
    fn categories_sorted_by_descending_count() {
        let summary = Summary::from_assessments(&sample());
        let ordered = summary.categories_by_count();
        assert!(ordered
            .windows(2)
            .all(|pair| pair[0].1 >= pair[1].1));
        assert_eq!(suspicious_entries(&sample()).len(), 4);
    }
}
