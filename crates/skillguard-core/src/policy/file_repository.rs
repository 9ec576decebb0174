use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::debug;

use super::{
    presets, CategorySet, CategorySpec, PatternPolicy, PolicyBundle, PolicyRepository, TierSpec,
};

/// Serialisation formats accepted for policy documents, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyFormat {
    Yaml,
    Json,
    Json5,
}

impl PolicyFormat {
    fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "json5" => Some(Self::Json5),
            _ => None,
        }
    }
}

/// On-disk shape of a policy version.
#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tiers: Vec<TierSpec>,
    /// Falls back to the built-in topic categories when absent.
    #[serde(default)]
    categories: Option<Vec<CategorySpec>>,
}

/// Loads a policy document (YAML, JSON or JSON5) from disk and caches the compiled result.
pub struct FilePolicyRepository {
    path: PathBuf,
    cache: OnceCell<PolicyBundle>,
}

impl FilePolicyRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    fn read_document(&self) -> Result<PolicyDocument> {
        let path = &self.path;
        let format = PolicyFormat::from_path(path).with_context(|| {
            format!(
                "unsupported policy file extension for {} (expected .yaml, .yml, .json or .json5)",
                path.display()
            )
        })?;
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file at {}", path.display()))?;
        let document = match format {
            PolicyFormat::Yaml => serde_yaml::from_str(&raw).map_err(anyhow::Error::from),
            PolicyFormat::Json => serde_json::from_str(&raw).map_err(anyhow::Error::from),
            PolicyFormat::Json5 => json5::from_str(&raw).map_err(anyhow::Error::from),
        }
        .with_context(|| format!("invalid policy document at {}", path.display()))?;
        Ok(document)
    }

    fn compile(&self) -> Result<PolicyBundle> {
        let document = self.read_document()?;
        let name = document.name.unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_string())
        });
        let risk = PatternPolicy::new(name, document.tiers)
            .with_context(|| format!("invalid risk policy in {}", self.path.display()))?;
        let category_specs = document
            .categories
            .unwrap_or_else(presets::category_specs);
        let categories = CategorySet::new(category_specs)
            .with_context(|| format!("invalid category policy in {}", self.path.display()))?;
        debug!(
            policy = risk.name(),
            rules = risk.rule_count(),
            categories = categories.len(),
            "loaded policy file"
        );
        Ok(PolicyBundle { risk, categories })
    }
}

impl PolicyRepository for FilePolicyRepository {
    fn load_policy(&self) -> Result<PolicyBundle> {
        let bundle = self.cache.get_or_try_init(|| self.compile())?;
        Ok(bundle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ConfigError, RiskTier};
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn loads_yaml_policy_with_categories() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("strict.yaml");
        write(
            &path,
            r#"
name: strict-v2
tiers:
  - tier: medium
    rules:
      - pattern: stealth.*browser
  - tier: critical
    rules:
      - pattern: keylogger
        label: "Critical: keylogger"
categories:
  - name: bot
    patterns: [scraper, crawler]
"#,
        );

        let repo = FilePolicyRepository::new(&path);
        let bundle = repo.load_policy().unwrap();
        assert_eq!(bundle.risk.name(), "strict-v2");
        assert_eq!(bundle.risk.tiers()[0].tier(), RiskTier::Critical);
        assert_eq!(bundle.risk.tiers()[0].rules()[0].label(), "Critical: keylogger");
        assert_eq!(
            bundle.risk.tiers()[1].rules()[0].label(),
            "Matches medium pattern: stealth.*browser"
        );
        assert_eq!(bundle.categories.len(), 1);
    }

    #[test]
    fn loads_json5_and_defaults_categories() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("paths.json5");
        write(
            &path,
            r#"{
    // comments are allowed in json5
    tiers: [
        { tier: "high", rules: [{ pattern: "brute.*force" }] },
    ],
}"#,
        );

        let bundle = FilePolicyRepository::new(&path).load_policy().unwrap();
        assert_eq!(bundle.risk.name(), "paths");
        assert_eq!(bundle.risk.rule_count(), 1);
        assert_eq!(bundle.categories.len(), 5);
    }

    #[test]
    fn bad_regex_fails_the_whole_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.json");
        write(
            &path,
            r#"{"tiers": [{"tier": "critical", "rules": [{"pattern": "keylogger"}, {"pattern": "(unclosed"}]}]}"#,
        );

        let err = FilePolicyRepository::new(&path).load_policy().unwrap_err();
        let config_err = err
            .downcast_ref::<ConfigError>()
            .expect("root cause should be a ConfigError");
        assert!(matches!(
            config_err,
            ConfigError::InvalidPattern { pattern, .. } if pattern == "(unclosed"
        ));
        assert!(format!("{err:#}").contains("tier `critical`"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("policy.txt");
        write(&path, "keylogger");
        let err = FilePolicyRepository::new(&path).load_policy().unwrap_err();
        assert!(err.to_string().contains("unsupported policy file extension"));
    }

    #[test]
    fn loads_shipped_policies_from_repo() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../policies")
            .canonicalize()
            .expect("policies directory should exist");
        let bundle = FilePolicyRepository::new(dir.join("refined.yaml"))
            .load_policy()
            .expect("shipped policy should parse");
        let builtin = presets::pattern_policy(presets::PresetName::Refined).unwrap();
        assert_eq!(bundle.risk.name(), "refined");
        assert_eq!(bundle.risk.to_specs(), builtin.to_specs());
    }
}
