//! In-memory registry: aggregation, dependent counts, and ranking.

use std::ops::Deref;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{yield_now, JoinHandle};

use crate::error::Result;
use crate::normalizer::normalize;
use crate::parser::{ParseEvent, ParseSummary};

/// Canonical package before dependent counts exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    name: String,
    keywords: Vec<String>,
    dependencies: Vec<String>,
}

impl Package {
    /// Builds a package from already-normalized parts.
    pub fn new(name: String, keywords: Vec<String>, dependencies: Vec<String>) -> Self {
        Self {
            name,
            keywords,
            dependencies,
        }
    }

    /// Registry entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased, deduplicated keyword tokens.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Deduplicated names of every declared dependency.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Packages in source arrival order.
pub type Registry = Vec<Package>;

/// Package paired with the number of registry packages depending on it.
///
/// Only [`compute_dependents`] produces these, so a count is never read
/// before it has been computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPackage {
    #[serde(flatten)]
    package: Package,
    number_of_dependents: usize,
}

impl ScoredPackage {
    pub(crate) fn new(package: Package, number_of_dependents: usize) -> Self {
        Self {
            package,
            number_of_dependents,
        }
    }

    /// Direct dependents found in the registry.
    pub fn number_of_dependents(&self) -> usize {
        self.number_of_dependents
    }
}

impl Deref for ScoredPackage {
    type Target = Package;

    fn deref(&self) -> &Package {
        &self.package
    }
}

/// Collects normalized packages in arrival order.
#[derive(Debug, Default)]
pub struct RegistryAggregator {
    packages: Vec<Package>,
    expected: Option<usize>,
}

impl RegistryAggregator {
    /// Creates an empty, growable aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an aggregator pre-sized for `total` packages.
    pub fn with_expected(total: usize) -> Self {
        let mut aggregator = Self::new();
        aggregator.expect(total);
        aggregator
    }

    /// Records the advertised entry count and reserves room for it.
    ///
    /// Oversized hints fall back to growing on demand.
    pub fn expect(&mut self, total: usize) {
        self.expected = Some(total);
        let missing = total.saturating_sub(self.packages.len());
        if let Err(err) = self.packages.try_reserve_exact(missing) {
            tracing::warn!(total, %err, "could not pre-size registry, growing on demand");
        }
    }

    /// Appends the next package in arrival order.
    ///
    /// Names are not checked: a repeated entry takes its own slot.
    pub fn push(&mut self, package: Package) {
        self.packages.push(package);
    }

    /// Count advertised by the source, if any.
    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    /// Packages collected so far.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True when nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Returns the collected registry.
    pub fn finish(self) -> Registry {
        self.packages
    }
}

/// Drains parser events into a registry.
///
/// Records are normalized as they arrive. `on_size` runs once when the parser
/// reports the advertised entry count. The registry is returned only after
/// the channel closes, the parser task has reported success, and one
/// scheduler tick has passed; any parser error is returned instead.
pub async fn aggregate_registry<F>(
    mut events: mpsc::Receiver<ParseEvent>,
    parser: JoinHandle<Result<ParseSummary>>,
    mut on_size: F,
) -> Result<Registry>
where
    F: FnMut(usize),
{
    let mut aggregator = RegistryAggregator::new();
    while let Some(event) = events.recv().await {
        match event {
            ParseEvent::ExpectedRecords(total) => {
                aggregator.expect(total);
                on_size(total);
            }
            ParseEvent::Record(record) => aggregator.push(normalize(&record)),
        }
    }

    let summary = parser.await??;
    yield_now().await;

    tracing::info!(
        packages = aggregator.len(),
        expected = ?summary.expected,
        "registry aggregated"
    );
    Ok(aggregator.finish())
}

struct Slot {
    source: usize,
    dependents: usize,
}

/// Counts, for every package, how many registry packages list it as a
/// direct dependency.
///
/// Output follows first-occurrence order of each name. When a name repeats,
/// the last copy takes that position and receives the count; dependency
/// names missing from the registry are ignored.
pub fn compute_dependents(registry: Registry) -> Vec<ScoredPackage> {
    let mut lookup: IndexMap<&str, Slot> = IndexMap::with_capacity(registry.len());
    for (index, package) in registry.iter().enumerate() {
        lookup
            .entry(package.name())
            .and_modify(|slot| slot.source = index)
            .or_insert(Slot {
                source: index,
                dependents: 0,
            });
    }

    for package in &registry {
        for dependency in package.dependencies() {
            if let Some(slot) = lookup.get_mut(dependency.as_str()) {
                slot.dependents += 1;
            }
        }
    }

    let slots: Vec<Slot> = lookup.into_values().collect();
    let mut packages: Vec<Option<Package>> = registry.into_iter().map(Some).collect();
    slots
        .into_iter()
        .filter_map(|slot| {
            packages[slot.source]
                .take()
                .map(|package| ScoredPackage::new(package, slot.dependents))
        })
        .collect()
}

/// Keeps packages with more than `min_dependents` dependents, most depended
/// upon first.
///
/// The sort is stable, so equal counts keep their incoming order.
pub fn filter_and_rank(
    mut packages: Vec<ScoredPackage>,
    min_dependents: usize,
) -> Vec<ScoredPackage> {
    packages.retain(|package| package.number_of_dependents() > min_dependents);
    packages.sort_by(|a, b| b.number_of_dependents().cmp(&a.number_of_dependents()));
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::parser::RecordParser;
    use pretty_assertions::assert_eq;

    fn package(name: &str, dependencies: &[&str]) -> Package {
        Package::new(
            name.to_string(),
            vec![name.to_string()],
            dependencies.iter().map(|dep| dep.to_string()).collect(),
        )
    }

    fn counts(scored: &[ScoredPackage]) -> Vec<(&str, usize)> {
        scored
            .iter()
            .map(|package| (package.name(), package.number_of_dependents()))
            .collect()
    }

    fn spawn_parser(
        doc: &'static str,
    ) -> (mpsc::Receiver<ParseEvent>, JoinHandle<Result<ParseSummary>>) {
        let (mut tx, rx) = mpsc::channel(2);
        let handle = tokio::task::spawn_blocking(move || {
            RecordParser::new("test").parse(doc.as_bytes(), &mut tx)
        });
        (rx, handle)
    }

    #[test]
    fn aggregator_reserves_expected_capacity() {
        let mut aggregator = RegistryAggregator::with_expected(128);
        assert!(aggregator.packages.capacity() >= 128);
        assert_eq!(aggregator.expected(), Some(128));

        aggregator.push(package("a", &[]));
        aggregator.push(package("a", &[]));
        assert_eq!(aggregator.len(), 2);
        assert_eq!(aggregator.finish().len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn aggregates_in_arrival_order_with_size_hint() {
        let (rx, parser) = spawn_parser(
            r#"{"total_rows": 3, "rows": [
                {"key": "c", "value": {}},
                {"key": "a", "value": {"dependencies": {"c": "1"}}},
                {"key": "b", "value": {}}
            ]}"#,
        );
        let mut sizes = Vec::new();
        let registry = aggregate_registry(rx, parser, |total| sizes.push(total))
            .await
            .expect("aggregate");

        assert_eq!(sizes, vec![3]);
        let names: Vec<&str> = registry.iter().map(Package::name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(registry[1].dependencies(), ["c"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn size_callback_is_skipped_without_count() {
        let (rx, parser) = spawn_parser(r#"{"rows": {"a": {}}}"#);
        let mut calls = 0;
        let registry = aggregate_registry(rx, parser, |_| calls += 1)
            .await
            .expect("aggregate");
        assert_eq!(calls, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parser_errors_reject_aggregation() {
        let (rx, parser) = spawn_parser(r#"{"rows": [{"key": "a", "value": {}}, oops]}"#);
        let result = aggregate_registry(rx, parser, |_| {}).await;
        assert!(matches!(result, Err(PipelineError::MalformedDocument(_))));
    }

    #[test]
    fn counts_direct_dependents() {
        let registry = vec![
            package("a", &["b"]),
            package("b", &[]),
            package("c", &["b", "not-in-registry"]),
        ];
        let scored = compute_dependents(registry);
        assert_eq!(counts(&scored), vec![("a", 0), ("b", 2), ("c", 0)]);
    }

    #[test]
    fn dependencies_outside_registry_count_nowhere() {
        let registry = vec![package("a", &["x", "y"]), package("b", &["x"])];
        let scored = compute_dependents(registry);
        assert_eq!(counts(&scored), vec![("a", 0), ("b", 0)]);
    }

    #[test]
    fn repeated_names_keep_first_position_and_last_copy() {
        let registry = vec![
            package("a", &["b"]),
            package("b", &[]),
            Package::new("a".into(), vec!["second".into()], vec!["b".into()]),
        ];
        let scored = compute_dependents(registry);

        assert_eq!(counts(&scored), vec![("a", 0), ("b", 2)]);
        assert_eq!(scored[0].keywords(), ["second"]);
    }

    #[test]
    fn filters_by_threshold_and_sorts_descending() {
        let scored = vec![
            ScoredPackage::new(package("five", &[]), 5),
            ScoredPackage::new(package("twenty-a", &[]), 20),
            ScoredPackage::new(package("three", &[]), 3),
            ScoredPackage::new(package("twenty-b", &[]), 20),
        ];
        let ranked = filter_and_rank(scored, 4);

        assert_eq!(
            counts(&ranked),
            vec![("twenty-a", 20), ("twenty-b", 20), ("five", 5)]
        );
    }

    #[test]
    fn threshold_is_exclusive() {
        let scored = vec![
            ScoredPackage::new(package("edge", &[]), 10),
            ScoredPackage::new(package("over", &[]), 11),
        ];
        assert_eq!(counts(&filter_and_rank(scored, 10)), vec![("over", 11)]);
    }

    #[test]
    fn scored_package_serializes_with_count() {
        let scored = ScoredPackage::new(package("left-pad", &["x"]), 1);
        let value = serde_json::to_value(&scored).expect("serialize");
        assert_eq!(value["name"], "left-pad");
        assert_eq!(value["numberOfDependents"], 1);
        assert_eq!(value["dependencies"][0], "x");
    }
}
