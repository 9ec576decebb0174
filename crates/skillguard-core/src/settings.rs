use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    decision::DecisionPolicy,
    extract::{Extractor, DEFAULT_LINK_BASE, DEFAULT_TREE_ROOT},
    fence::DEFAULT_FENCE,
    policy::{
        file_repository::FilePolicyRepository,
        presets::{PresetName, PresetRepository},
        PolicyBundle, PolicyRepository,
    },
    rewrite::{
        AnchorKind, AnchorPredicate, HeadingAnchor, NoticePlacement, Rewriter, SeparatorAnchor,
        DEFAULT_FLAG_MARKER, DEFAULT_LINK_PATTERN,
    },
};

/// Everything a scan or sanitize run needs, deserialisable from layered config sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeSettings {
    /// Built-in policy version, used when `policy_file` is unset.
    pub policy: PresetName,
    pub policy_file: Option<PathBuf>,
    /// Tier → action table driving the rewriter.
    pub decisions: DecisionPolicy,
    pub anchor_kind: AnchorKind,
    /// Only read when `anchor_kind` is `heading`.
    pub anchor_level: usize,
    pub anchor_keyword: String,
    pub notice_placement: NoticePlacement,
    pub marker: String,
    /// Shared by extraction and rewriting.
    pub fence: String,
    pub link_pattern: String,
    /// Replaces the built-in notice text when set.
    pub notice_file: Option<PathBuf>,
    pub tree_root: String,
    pub link_base: Option<String>,
}

impl Default for SanitizeSettings {
    fn default() -> Self {
        Self {
            policy: PresetName::default(),
            policy_file: None,
            decisions: DecisionPolicy::default(),
            anchor_kind: AnchorKind::default(),
            anchor_level: 2,
            anchor_keyword: "Why".to_string(),
            notice_placement: NoticePlacement::default(),
            marker: DEFAULT_FLAG_MARKER.to_string(),
            fence: DEFAULT_FENCE.to_string(),
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
            notice_file: None,
            tree_root: DEFAULT_TREE_ROOT.to_string(),
            link_base: Some(DEFAULT_LINK_BASE.to_string()),
        }
    }
}

impl SanitizeSettings {
    /// Load the configured policy file, or the selected preset.
    pub fn load_policy(&self) -> Result<PolicyBundle> {
        match &self.policy_file {
            Some(path) => FilePolicyRepository::new(path).load_policy(),
            None => PresetRepository::new(self.policy).load_policy(),
        }
    }

    pub fn extractor(&self) -> Extractor {
        Extractor::new(self.tree_root.clone(), self.link_base.clone())
            .with_fence(self.fence.clone())
    }

    pub fn anchor(&self) -> Box<dyn AnchorPredicate> {
        match self.anchor_kind {
            AnchorKind::Heading => Box::new(HeadingAnchor::new(
                self.anchor_level,
                self.anchor_keyword.clone(),
            )),
            AnchorKind::Separator => Box::new(SeparatorAnchor),
        }
    }

    pub fn rewriter(&self) -> Result<Rewriter> {
        let mut rewriter = Rewriter::default()
            .with_link_pattern(&self.link_pattern)?
            .with_fence(self.fence.clone())
            .with_marker(self.marker.clone())
            .with_placement(self.notice_placement);
        if let Some(path) = &self.notice_file {
            let notice = fs::read_to_string(path)
                .with_context(|| format!("failed to read notice file at {}", path.display()))?;
            rewriter = rewriter.with_notice(notice);
        }
        Ok(rewriter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::assess,
        decision::{Action, DecisionMap},
        policy::RiskTier,
        rewrite::NoticeOutcome,
    };

    #[test]
    fn defaults_use_comprehensive_preset_and_strict_decisions() {
        let settings = SanitizeSettings::default();
        let bundle = settings.load_policy().unwrap();
        assert_eq!(bundle.risk.name(), "comprehensive");
        assert_eq!(settings.decisions.action_for(RiskTier::High), Action::Remove);
        assert!(settings.rewriter().is_ok());
    }

    #[test]
    fn deserializes_partial_settings() {
        let settings: SanitizeSettings = serde_json::from_str(
            r#"{"policy": "refined", "decisions": {"critical": "remove", "medium": "flag"}, "anchor_keyword": "Install"}"#,
        )
        .unwrap();
        assert_eq!(settings.policy, PresetName::Refined);
        assert_eq!(settings.decisions.action_for(RiskTier::High), Action::Keep);
        assert_eq!(settings.anchor_keyword, "Install");
        assert_eq!(settings.anchor_level, 2);
    }

    #[test]
    fn notice_file_must_exist() {
        let settings = SanitizeSettings {
            notice_file: Some(PathBuf::from("/nonexistent/notice.md")),
            ..SanitizeSettings::default()
        };
        let err = settings.rewriter().unwrap_err();
        assert!(err.to_string().contains("failed to read notice file"));
    }

    #[test]
    fn reads_notice_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notice.md");
        fs::write(&path, "line one\nline two\n").unwrap();
        let settings = SanitizeSettings {
            notice_file: Some(path),
            ..SanitizeSettings::default()
        };
        assert_eq!(settings.rewriter().unwrap().notice_line_count(), 2);
    }

    #[test]
    fn custom_fence_reaches_extraction_and_rewrite() {
        let settings = SanitizeSettings {
            fence: "~~~".to_string(),
            ..SanitizeSettings::default()
        };
        let doc = "## Why\n```\n- [Keylogger Pro](https://e.x/kl) - logs keystrokes silently\n```\n";

        let extraction = settings.extractor().extract_markdown(doc);
        assert_eq!(extraction.entries.len(), 1);
        let assessments = assess(extraction.entries, &settings.load_policy().unwrap());
        let decisions = DecisionMap::from_entries(
            assessments.iter().map(|assessment| &assessment.entry),
            &settings.decisions,
        );
        let anchor = settings.anchor();
        let outcome = settings.rewriter().unwrap().rewrite(doc, &decisions, &*anchor);
        assert_eq!(outcome.removed, 1);
        assert!(!outcome.document.contains("logs keystrokes silently"));
    }

    #[test]
    fn separator_anchor_is_selectable() {
        let settings: SanitizeSettings = serde_json::from_str(
            r#"{"anchor_kind": "separator", "notice_placement": "after"}"#,
        )
        .unwrap();
        let anchor = settings.anchor();
        let outcome = settings.rewriter().unwrap().rewrite(
            "# Skills\n---\nbody\n",
            &DecisionMap::default(),
            &*anchor,
        );
        assert_eq!(
            outcome.notice,
            NoticeOutcome::Inserted {
                anchor_line: 1,
                placement: NoticePlacement::After,
            }
        );
        assert!(outcome.document.starts_with("# Skills\n---\n"));
        assert!(outcome.document.ends_with("---\nbody\n"));
    }
}
