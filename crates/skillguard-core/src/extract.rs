use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    entry::Entry,
    fence::{FenceTracker, DEFAULT_FENCE},
};

/// Root directory that path-tree skills live under.
pub const DEFAULT_TREE_ROOT: &str = "skills";
/// Base URL prepended to path-tree identifiers to build browsable links.
pub const DEFAULT_LINK_BASE: &str = "https://github.com/openclaw/skills/tree/main/";

const TREE_PREFIX_SEGMENTS: usize = 3;
const TOC_HEADER: &str = "Table of Contents";

/// Markdown link target `](https://... "optional title")`. Group 1 is the identifier.
///
/// Shared by extraction and rewriting so both read the same key off a line.
pub const LINK_PATTERN: &str = r#"\]\((https://[^)\s]+)(?:\s+"[^"]*")?\)"#;

static LIST_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^- \[([^\]]+){LINK_PATTERN}\s+-\s+(.+)$"))
        .expect("list entry regex is valid")
});

/// Kind of a record in a repository tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeItemKind {
    Tree,
    Blob,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeItemKind,
}

/// `{"tree": [{"path": ..., "type": "tree"|"blob"}, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeListing {
    #[serde(default)]
    pub tree: Vec<TreeItem>,
}

impl TreeListing {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Catalog input shapes understood by the extractor.
#[derive(Debug, Clone, Copy)]
pub enum CatalogSource<'a> {
    Markdown(&'a str),
    Tree(&'a TreeListing),
}

/// Extracted entries in input order plus the number of discarded duplicates.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entries: Vec<Entry>,
    pub duplicates_discarded: usize,
}

/// Turns a catalog source into a uniform, order-preserving entry list.
#[derive(Debug, Clone)]
pub struct Extractor {
    tree_root: String,
    link_base: Option<String>,
    fence: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_ROOT, Some(DEFAULT_LINK_BASE.to_string()))
    }
}

impl Extractor {
    pub fn new(tree_root: impl Into<String>, link_base: Option<String>) -> Self {
        Self {
            tree_root: tree_root.into(),
            link_base,
            fence: DEFAULT_FENCE.to_string(),
        }
    }

    /// Fence delimiter; must agree with the rewriter's so both skip the same lines.
    pub fn with_fence(mut self, delimiter: impl Into<String>) -> Self {
        self.fence = delimiter.into();
        self
    }

    pub fn extract(&self, source: CatalogSource<'_>) -> Extraction {
        match source {
            CatalogSource::Markdown(text) => self.extract_markdown(text),
            CatalogSource::Tree(listing) => self.extract_tree(listing),
        }
    }

    /// Parse `- [NAME](URL) - DESCRIPTION` lines, tracking `### ` headers as topic hints.
    ///
    /// Lines inside fenced blocks are never read. A repeated URL keeps its first entry.
    pub fn extract_markdown(&self, text: &str) -> Extraction {
        let mut fence = FenceTracker::new(self.fence.as_str());
        let mut seen = HashSet::new();
        let mut extraction = Extraction::default();
        let mut topic: Option<String> = None;

        for line in text.lines() {
            if fence.observe(line).is_verbatim() {
                continue;
            }
            if let Some(title) = line.strip_prefix("### ") {
                if !title.contains(TOC_HEADER) {
                    topic = Some(
                        title
                            .trim_matches(|c: char| c == '#' || c.is_whitespace())
                            .to_string(),
                    );
                }
                continue;
            }
            let Some(caps) = LIST_ENTRY.captures(line) else {
                continue;
            };
            let url = &caps[2];
            if !seen.insert(url.to_string()) {
                trace!(%url, "duplicate catalog entry discarded");
                extraction.duplicates_discarded += 1;
                continue;
            }
            extraction.entries.push(Entry::listed(
                &caps[1],
                url,
                caps[3].trim_end(),
                topic.clone(),
            ));
        }

        debug!(
            entries = extraction.entries.len(),
            duplicates = extraction.duplicates_discarded,
            "extracted markdown catalog"
        );
        extraction
    }

    /// Derive one entry per `root/<group>/<skill>` directory prefix, first-seen order.
    pub fn extract_tree(&self, listing: &TreeListing) -> Extraction {
        let mut seen = HashSet::new();
        let mut extraction = Extraction::default();

        for item in listing
            .tree
            .iter()
            .filter(|item| item.kind == TreeItemKind::Tree)
        {
            let parts: Vec<&str> = item.path.split('/').collect();
            if parts.len() < TREE_PREFIX_SEGMENTS || parts[0] != self.tree_root {
                continue;
            }
            let prefix = parts[..TREE_PREFIX_SEGMENTS].join("/");
            if !seen.insert(prefix.clone()) {
                continue;
            }
            let url = self.link_base.as_ref().map(|base| format!("{base}{prefix}"));
            extraction.entries.push(Entry::from_path(prefix, url));
        }

        debug!(entries = extraction.entries.len(), "extracted path tree");
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryOrigin;

    const CATALOG: &str = "\
# Awesome Skills

### Table of Contents
- [Web](#web)

### Web & Automation
- [Scraper](https://example.com/scraper) - Crawl pages fast
- not a link line
- [Dup](https://example.com/scraper) - second copy

### Security
- [Audit](https://example.com/audit) - Audit repos
```
- [Hidden](https://example.com/hidden) - inside a fence
```
";

    #[test]
    fn parses_list_entries_with_topic_hints() {
        let extraction = Extractor::default().extract(CatalogSource::Markdown(CATALOG));
        let entries = &extraction.entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display_name(), "Scraper");
        assert_eq!(entries[0].description(), "Crawl pages fast");
        assert_eq!(entries[0].topic_hint(), Some("Web & Automation"));
        assert_eq!(entries[1].identifier(), "https://example.com/audit");
        assert_eq!(entries[1].topic_hint(), Some("Security"));
    }

    #[test]
    fn duplicate_urls_keep_first_occurrence() {
        let extraction = Extractor::default().extract_markdown(CATALOG);
        assert_eq!(extraction.duplicates_discarded, 1);
        assert_eq!(extraction.entries[0].display_name(), "Scraper");
    }

    #[test]
    fn entries_inside_fences_are_ignored() {
        let extraction = Extractor::default().extract_markdown(CATALOG);
        assert!(extraction
            .entries
            .iter()
            .all(|entry| entry.display_name() != "Hidden"));
    }

    #[test]
    fn tree_listing_yields_single_entry() {
        let listing =
            TreeListing::from_json(r#"{"tree":[{"path":"skills/web/scraper-bot","type":"tree"}]}"#)
                .unwrap();
        let extraction = Extractor::default().extract(CatalogSource::Tree(&listing));
        assert_eq!(extraction.entries.len(), 1);
        let entry = &extraction.entries[0];
        assert_eq!(entry.identifier(), "skills/web/scraper-bot");
        assert_eq!(entry.display_name(), "scraper-bot");
        assert_eq!(entry.origin(), EntryOrigin::PathTree);
        assert_eq!(
            entry.url(),
            Some("https://github.com/openclaw/skills/tree/main/skills/web/scraper-bot")
        );
    }

    #[test]
    fn tree_prefixes_collapse_in_first_seen_order() {
        let listing = TreeListing::from_json(
            r#"{"tree":[
                {"path":"skills","type":"tree"},
                {"path":"skills/web","type":"tree"},
                {"path":"skills/web/zeta","type":"tree"},
                {"path":"skills/web/zeta/src","type":"tree"},
                {"path":"skills/web/zeta/SKILL.md","type":"blob"},
                {"path":"skills/ops/alpha","type":"tree"},
                {"path":"docs/web/other","type":"tree"},
                {"path":"skills/web/beta","type":"blob"},
                {"path":"skills/web/gamma","type":"commit"}
            ]}"#,
        )
        .unwrap();
        let extraction = Extractor::new("skills", None).extract_tree(&listing);
        let ids: Vec<_> = extraction.entries.iter().map(Entry::identifier).collect();
        assert_eq!(ids, vec!["skills/web/zeta", "skills/ops/alpha"]);
        assert_eq!(extraction.duplicates_discarded, 0);
        assert!(extraction.entries[0].url().is_none());
    }

    #[test]
    fn link_titles_are_not_part_of_the_identifier() {
        let extraction = Extractor::default()
            .extract_markdown("- [Keylogger Pro](https://e.x/kl \"repo\") - logs keystrokes\n");
        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].identifier(), "https://e.x/kl");
        assert_eq!(extraction.entries[0].description(), "logs keystrokes");
    }

    #[test]
    fn custom_fence_replaces_backticks() {
        let doc = "\
```
- [Keylogger Pro](https://e.x/kl) - logs keystrokes silently
```
~~~
- [Hidden](https://e.x/hidden) - inside a tilde fence
~~~
";
        let extraction = Extractor::default().with_fence("~~~").extract_markdown(doc);
        let names: Vec<_> = extraction.entries.iter().map(Entry::display_name).collect();
        assert_eq!(names, vec!["Keylogger Pro"]);
    }
}
