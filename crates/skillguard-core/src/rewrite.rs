//! Structure-preserving document rewriter.
//!
//! A single forward pass drops or annotates lines whose catalog link has a
//! `remove`/`flag` decision. Fenced code blocks (and their delimiter lines) are
//! copied byte-for-byte and never inspected. The notice block is then inserted
//! once, next to the first prose line accepted by the anchor predicate.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    decision::{Action, DecisionMap},
    extract::LINK_PATTERN,
    fence::{FenceTracker, DEFAULT_FENCE},
    policy::{compile, ConfigError, PolicyScope},
};

/// Same grammar the extractor keys entries by.
pub const DEFAULT_LINK_PATTERN: &str = LINK_PATTERN;

/// Appended to flagged lines; an HTML comment leaves the markdown link intact.
pub const DEFAULT_FLAG_MARKER: &str = " <!-- ⚠️ SECURITY REVIEW REQUIRED -->";

pub const DEFAULT_NOTICE: &str = "
---

## 🔒 Sanitization Notice

This list has been automatically sanitized:

### Removed Skills (High Risk)
The following skills have been **removed** from this list:
- Keyloggers, password stealers and credit card skimmers
- Skills that bypass CAPTCHA or bot detection
- Tools explicitly designed to evade security measures

### Flagged Skills (Medium Risk)
Some skills are **flagged** with security warnings and require manual review:
- Stealth browser automation
- VPN rotation for bypassing rate limits

**Recommendation:** Always review source code before installing any skill.

---
";

/// Decides the line before which the notice block goes.
pub trait AnchorPredicate {
    fn is_anchor(&self, line: &str) -> bool;
}

impl<F> AnchorPredicate for F
where
    F: Fn(&str) -> bool,
{
    fn is_anchor(&self, line: &str) -> bool {
        self(line)
    }
}

/// Matches a heading of exactly `level` whose text contains `keyword`.
#[derive(Debug, Clone)]
pub struct HeadingAnchor {
    level: usize,
    keyword: String,
}

impl HeadingAnchor {
    pub fn new(level: usize, keyword: impl Into<String>) -> Self {
        Self {
            level: level.max(1),
            keyword: keyword.into(),
        }
    }
}

impl Default for HeadingAnchor {
    fn default() -> Self {
        Self::new(2, "Why")
    }
}

impl AnchorPredicate for HeadingAnchor {
    fn is_anchor(&self, line: &str) -> bool {
        let hashes = line.bytes().take_while(|b| *b == b'#').count();
        if hashes != self.level {
            return false;
        }
        match line[hashes..].strip_prefix(' ') {
            Some(text) => text.contains(self.keyword.as_str()),
            None => false,
        }
    }
}

/// Matches a horizontal rule line (`---...`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SeparatorAnchor;

impl AnchorPredicate for SeparatorAnchor {
    fn is_anchor(&self, line: &str) -> bool {
        line.starts_with("---")
    }
}

/// Anchor predicates selectable from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    /// [`HeadingAnchor`] built from the configured level and keyword.
    #[default]
    Heading,
    /// [`SeparatorAnchor`].
    Separator,
}

/// Which side of the anchor line the notice block goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticePlacement {
    #[default]
    Before,
    After,
}

/// Raised in the outcome when no line satisfied the anchor predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no line matched the notice anchor; notice block was not inserted")]
pub struct NoticeNotInsertedWarning;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeOutcome {
    /// Zero-based index of the anchor line in the filtered output (before insertion).
    Inserted {
        anchor_line: usize,
        placement: NoticePlacement,
    },
    NotInserted(NoticeNotInsertedWarning),
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub document: String,
    pub removed: usize,
    pub flagged: usize,
    pub notice: NoticeOutcome,
    /// Input ended inside an unterminated fenced block; it was left open.
    pub fence_left_open: bool,
}

impl RewriteOutcome {
    pub fn notice_inserted(&self) -> bool {
        matches!(self.notice, NoticeOutcome::Inserted { .. })
    }

    pub fn warning(&self) -> Option<&NoticeNotInsertedWarning> {
        match &self.notice {
            NoticeOutcome::NotInserted(warning) => Some(warning),
            NoticeOutcome::Inserted { .. } => None,
        }
    }
}

struct EmittedLine<'a> {
    text: std::borrow::Cow<'a, str>,
    prose: bool,
}

/// Configurable rewriter; reusable across documents.
#[derive(Debug, Clone)]
pub struct Rewriter {
    link: Regex,
    fence: String,
    marker: String,
    notice: String,
    placement: NoticePlacement,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self {
            link: Regex::new(DEFAULT_LINK_PATTERN).expect("default link pattern is valid"),
            fence: DEFAULT_FENCE.to_string(),
            marker: DEFAULT_FLAG_MARKER.to_string(),
            notice: DEFAULT_NOTICE.to_string(),
            placement: NoticePlacement::Before,
        }
    }
}

impl Rewriter {
    /// Replace the identifier pattern. Capture group 1 is used when present, else the whole match.
    pub fn with_link_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.link = compile(pattern, || PolicyScope::LinkPattern)?;
        Ok(self)
    }

    pub fn with_fence(mut self, delimiter: impl Into<String>) -> Self {
        self.fence = delimiter.into();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }

    pub fn with_placement(mut self, placement: NoticePlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Number of raw lines the notice block adds when inserted.
    pub fn notice_line_count(&self) -> usize {
        self.notice.lines().count()
    }

    fn identifier<'t>(&self, line: &'t str) -> Option<&'t str> {
        let caps = self.link.captures(line)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    fn notice_block(&self, line_ending: &str) -> String {
        let mut block = String::new();
        for line in self.notice.lines() {
            block.push_str(line);
            block.push_str(line_ending);
        }
        block
    }

    #[instrument(name = "rewrite_document", skip_all, fields(input_len = document.len()))]
    pub fn rewrite(
        &self,
        document: &str,
        decisions: &DecisionMap,
        anchor: &dyn AnchorPredicate,
    ) -> RewriteOutcome {
        let line_ending = if document.contains("\r\n") { "\r\n" } else { "\n" };
        let mut fence = FenceTracker::new(self.fence.as_str());
        let mut emitted: Vec<EmittedLine<'_>> = Vec::new();
        let mut removed = 0;
        let mut flagged = 0;

        for (idx, raw) in document.split_inclusive('\n').enumerate() {
            let (content, terminator) = split_terminator(raw);
            if fence.observe(content).is_verbatim() {
                emitted.push(EmittedLine {
                    text: raw.into(),
                    prose: false,
                });
                continue;
            }
            let action = self
                .identifier(content)
                .map(|id| decisions.action(id))
                .unwrap_or_default();
            match action {
                Action::Remove => {
                    removed += 1;
                    debug!(line = idx + 1, "removed entry line");
                }
                Action::Flag => {
                    flagged += 1;
                    debug!(line = idx + 1, "flagged entry line");
                    let annotated = format!("{}{}{}", content.trim_end(), self.marker, terminator);
                    emitted.push(EmittedLine {
                        text: annotated.into(),
                        prose: true,
                    });
                }
                Action::Keep => emitted.push(EmittedLine {
                    text: raw.into(),
                    prose: true,
                }),
            }
        }

        let anchor_idx = emitted
            .iter()
            .position(|line| line.prose && anchor.is_anchor(split_terminator(&line.text).0));

        let mut output = String::with_capacity(document.len() + self.notice.len());
        let mut notice_inserted = false;
        for (idx, line) in emitted.iter().enumerate() {
            let at_anchor = !notice_inserted && Some(idx) == anchor_idx;
            if at_anchor && self.placement == NoticePlacement::Before {
                output.push_str(&self.notice_block(line_ending));
                notice_inserted = true;
            }
            output.push_str(&line.text);
            if at_anchor && self.placement == NoticePlacement::After {
                if !line.text.ends_with('\n') {
                    output.push_str(line_ending);
                }
                output.push_str(&self.notice_block(line_ending));
                notice_inserted = true;
            }
        }

        let notice = match anchor_idx {
            Some(anchor_line) => NoticeOutcome::Inserted {
                anchor_line,
                placement: self.placement,
            },
            None => {
                debug!("notice anchor not found");
                NoticeOutcome::NotInserted(NoticeNotInsertedWarning)
            }
        };
        debug!(removed, flagged, notice_inserted, "rewrite completed");

        RewriteOutcome {
            document: output,
            removed,
            flagged,
            notice,
            fence_left_open: fence.is_open(),
        }
    }
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(content) = raw.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = raw.strip_suffix('\n') {
        (content, "\n")
    } else {
        (raw, "")
    }
}
