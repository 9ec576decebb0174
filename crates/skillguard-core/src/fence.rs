/// Default fenced-block delimiter.
pub const DEFAULT_FENCE: &str = "```";

/// Where a line sits relative to fenced code blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRegion {
    /// Ordinary markdown text.
    Prose,
    /// Line containing the delimiter; flips the state.
    Toggle,
    /// Line inside an open fenced block.
    Fenced,
}

impl LineRegion {
    /// Toggle and fenced lines are emitted verbatim and never inspected.
    pub fn is_verbatim(self) -> bool {
        !matches!(self, Self::Prose)
    }
}

/// Two-state fence tracker: any line containing the delimiter toggles, blocks never nest.
///
/// An odd number of delimiters leaves the tracker open until end of input.
#[derive(Debug, Clone)]
pub struct FenceTracker {
    delimiter: String,
    open: bool,
}

impl FenceTracker {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            open: false,
        }
    }

    /// Classify `line` and advance the state.
    pub fn observe(&mut self, line: &str) -> LineRegion {
        if line.contains(self.delimiter.as_str()) {
            self.open = !self.open;
            LineRegion::Toggle
        } else if self.open {
            LineRegion::Fenced
        } else {
            LineRegion::Prose
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Default for FenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FENCE)
    }
}
