//! Raw registry entries to canonical packages.
//!
//! Everything here is pure: no IO, no failure modes. Unexpected shapes were
//! already coerced to empty collections by the parser.

use indexmap::IndexSet;

use crate::parser::{RawKeywords, RawRecord};
use crate::registry::Package;

/// Characters that separate sub-tokens inside a compound keyword.
pub const KEYWORD_SEPARATORS: [char; 3] = ['-', '_', ' '];

/// Maps one raw entry to its canonical package.
pub fn normalize(record: &RawRecord) -> Package {
    Package::new(
        record.name.clone(),
        normalize_keywords(record),
        gather_dependencies(record),
    )
}

/// Deduplicated union of the four dependency maps' keys.
///
/// Order is runtime, dev, peer, optional with the first occurrence kept.
pub fn gather_dependencies(record: &RawRecord) -> Vec<String> {
    record
        .dependency_maps()
        .into_iter()
        .flat_map(|deps| deps.keys())
        .cloned()
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Keyword tokens for `record`, package name included.
///
/// Every candidate contributes its lowercased sub-tokens followed by the
/// lowercased candidate itself; duplicates across candidates are dropped.
pub fn normalize_keywords(record: &RawRecord) -> Vec<String> {
    let candidates: Vec<&str> = match &record.keywords {
        RawKeywords::Single(keyword) => vec![keyword.as_str()],
        RawKeywords::List(keywords) => keywords.iter().map(String::as_str).collect(),
        RawKeywords::Absent => Vec::new(),
    };

    candidates
        .into_iter()
        .chain(std::iter::once(record.name.as_str()))
        .flat_map(split_keyword)
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Lowercases `keyword` and splits it on runs of separators.
///
/// The full lowercased keyword is always the last element, even when it
/// matches one of the parts.
pub fn split_keyword(keyword: &str) -> Vec<String> {
    let lowered = keyword.to_lowercase();
    let mut tokens: Vec<String> = lowered
        .split(KEYWORD_SEPARATORS)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    tokens.push(lowered);
    tokens
}
