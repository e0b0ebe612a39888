//! Keyword frequency ranking across a filtered registry.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::registry::ScoredPackage;

/// Matches tokens unfit for an entity list: a leading character outside
/// `[A-Za-z0-9]`, or any character outside `[A-Za-z0-9.-]`.
const REJECTED_KEYWORD: &str = r"^[^a-zA-Z0-9]|[^a-zA-Z0-9.-]";

fn rejected_keyword() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(REJECTED_KEYWORD).expect("valid keyword pattern"))
}

/// Returns true when `keyword` may appear in the ranked vocabulary.
pub fn is_valid_keyword(keyword: &str) -> bool {
    !rejected_keyword().is_match(keyword)
}

/// Occurrence count of every valid keyword, in first-seen order.
pub fn keyword_frequencies<'a, I>(packages: I) -> IndexMap<&'a str, usize>
where
    I: IntoIterator<Item = &'a ScoredPackage>,
{
    let mut distribution: IndexMap<&'a str, usize> = IndexMap::new();
    for package in packages {
        for keyword in package.keywords() {
            if is_valid_keyword(keyword) {
                *distribution.entry(keyword.as_str()).or_insert(0) += 1;
            }
        }
    }
    distribution
}

/// Valid keywords sorted by descending frequency, at most `max_keywords`.
///
/// Equal frequencies keep first-seen order.
pub fn rank_keywords(packages: &[ScoredPackage], max_keywords: usize) -> Vec<String> {
    rank_distribution(keyword_frequencies(packages), max_keywords)
}

fn rank_distribution(distribution: IndexMap<&str, usize>, max_keywords: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, usize)> = distribution.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(keyword, _)| keyword.to_string())
        .collect()
}
