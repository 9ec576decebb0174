use std::fmt::Write;

use serde::Serialize;

use crate::{aggregate::Summary, entry::Entry, policy::RiskTier};

const TOP_CATEGORIES: usize = 10;

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `Summary` using the desired format.
pub fn render_summary(summary: &Summary, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(summary),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
    }
}

fn render_human(summary: &Summary) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Total Skills: {}", summary.total)?;
    writeln!(
        out,
        "Suspicious: {} ({:.1}%)",
        summary.suspicious,
        summary.suspicious_ratio() * 100.0
    )?;
    writeln!(out)?;

    writeln!(out, "By Risk Level:")?;
    for tier in RiskTier::RANKED {
        writeln!(
            out,
            "  - {tier:<8} : {count:>4} skills",
            tier = tier.as_str().to_uppercase(),
            count = summary.count(tier)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "By Category:")?;
    if summary.by_category.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for (name, count) in summary.categories_by_count().into_iter().take(TOP_CATEGORIES) {
        writeln!(out, "  - {name:<20} : {count:>4} skills")?;
    }

    for (tier, names) in [
        (RiskTier::Critical, &summary.critical),
        (RiskTier::High, &summary.high),
        (RiskTier::Medium, &summary.medium),
    ] {
        if names.is_empty() {
            continue;
        }
        writeln!(
            out,
            "\n{} RISK SKILLS ({}):",
            tier.as_str().to_uppercase(),
            names.len()
        )?;
        for name in names {
            writeln!(out, "  - {name}")?;
        }
    }

    Ok(out)
}

/// One line of the suspicious-skills dump.
#[derive(Debug, Serialize)]
pub struct SuspiciousRecord<'a> {
    pub name: &'a str,
    pub identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    pub risk: RiskTier,
    pub reason: Option<&'a str>,
}

impl<'a> From<&'a Entry> for SuspiciousRecord<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            name: entry.display_name(),
            identifier: entry.identifier(),
            url: entry.url(),
            risk: entry.risk_tier(),
            reason: entry.risk_reason(),
        }
    }
}

pub fn render_suspicious(entries: &[&Entry]) -> anyhow::Result<String> {
    let records: Vec<SuspiciousRecord<'_>> = entries.iter().map(|entry| (*entry).into()).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{assess, suspicious_entries};
    use crate::policy::presets::{PresetName, PresetRepository};
    use crate::policy::PolicyRepository;

    fn sample_summary() -> (Summary, Vec<crate::aggregate::Assessment>) {
        let policy = PresetRepository::new(PresetName::Comprehensive)
            .load_policy()
            .unwrap();
        let assessments = assess(
            vec![
                Entry::listed("Keylogger Pro", "https://e.x/1", "logs keys", None),
                Entry::listed("Docker Helper", "https://e.x/2", "build images", None),
            ],
            &policy,
        );
        (Summary::from_assessments(&assessments), assessments)
    }

    #[test]
    fn human_report_lists_tiers_and_names() {
        let (summary, _) = sample_summary();
        let output = render_summary(&summary, OutputFormat::Human).unwrap();
        assert!(output.contains("Total Skills: 2"));
        assert!(output.contains("Suspicious: 1 (50.0%)"));
        assert!(output.contains("CRITICAL RISK SKILLS (1)"));
        assert!(output.contains("Keylogger Pro"));
        assert!(!output.contains("HIGH RISK SKILLS"));
    }

    #[test]
    fn json_report_has_all_tiers() {
        let (summary, _) = sample_summary();
        let output = render_summary(&summary, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["total"], serde_json::json!(2));
        for tier in ["critical", "high", "medium", "low"] {
            assert!(value["by_risk_tier"][tier].is_number(), "missing {tier}");
        }
        assert_eq!(value["by_risk_tier"]["low"], serde_json::json!(1));
        assert_eq!(value["critical"], serde_json::json!(["Keylogger Pro"]));
    }

    #[test]
    fn suspicious_dump_carries_reason() {
        let (_, assessments) = sample_summary();
        let output = render_suspicious(&suspicious_entries(&assessments)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["risk"], "critical");
        assert_eq!(
            value[0]["reason"],
            "Matches critical pattern: keylogger"
        );
    }
}
