pub mod aggregate;
pub mod categorize;
pub mod classify;
pub mod decision;
pub mod entry;
pub mod extract;
pub mod fence;
pub mod policy;
pub mod report;
pub mod rewrite;
pub mod settings;

pub use aggregate::{assess, suspicious_entries, Assessment, Summary};
pub use categorize::categorize;
pub use classify::{classify, classify_all, Classification};
pub use decision::{Action, DecisionMap, DecisionPolicy};
pub use entry::{Entry, EntryOrigin};
pub use extract::{CatalogSource, Extraction, Extractor, TreeListing};
pub use policy::{
    file_repository::FilePolicyRepository,
    presets::{PresetName, PresetRepository},
    CategorySet, ConfigError, PatternPolicy, PolicyBundle, PolicyRepository, RiskTier,
};
pub use rewrite::{
    AnchorKind, AnchorPredicate, HeadingAnchor, NoticeNotInsertedWarning, NoticeOutcome,
    NoticePlacement, RewriteOutcome, Rewriter, SeparatorAnchor,
};
pub use settings::SanitizeSettings;
