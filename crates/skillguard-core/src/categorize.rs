use std::collections::BTreeSet;

use crate::{
    entry::Entry,
    policy::{CategorySet, DEFAULT_CATEGORY},
};

/// Union of every category with at least one matching rule, or `{"general"}`.
pub fn categorize_text(text: &str, categories: &CategorySet) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = categories
        .iter()
        .filter(|category| category.matches(text))
        .map(|category| category.name().to_string())
        .collect();
    if labels.is_empty() {
        labels.insert(DEFAULT_CATEGORY.to_string());
    }
    labels
}

pub fn categorize(entry: &Entry, categories: &CategorySet) -> BTreeSet<String> {
    categorize_text(&entry.match_text(), categories)
}
