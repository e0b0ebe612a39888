//! Build runner composing the registry pipeline.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tokio_util::io::SyncIoBridge;

use crate::controls::BuildControls;
use crate::entities::{save_entity_type, to_entities, EntityTypeDocument};
use crate::error::{PipelineError, Result};
use crate::keywords::rank_keywords;
use crate::parser::{ParseEvent, RecordParser};
use crate::registry::{aggregate_registry, compute_dependents, filter_and_rank};
use crate::source::{http_client, open_source, SourceLocation};

/// Parsed records buffered between the blocking parser and the aggregator.
pub const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// What each stage of one build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Count advertised by the source, if it arrived before the rows.
    pub expected_packages: Option<usize>,
    /// Packages aggregated from the source, duplicates included.
    pub registry_packages: usize,
    /// Distinct package names with a dependent count.
    pub scored_packages: usize,
    /// Packages above the dependents threshold.
    pub ranked_packages: usize,
    /// Keywords written to the entity type.
    pub keywords: usize,
    /// Where the entity type was written.
    pub output: PathBuf,
    /// Wall time of the build.
    pub elapsed: Duration,
}

impl BuildReport {
    /// Prints the per-stage summary to stdout.
    pub fn report(&self) {
        let secs = self.elapsed.as_secs_f32().max(f32::EPSILON);
        println!("--- keyword build ({secs:.2}s) ---");
        match self.expected_packages {
            Some(expected) => println!("advertised packages: {expected}"),
            None => println!("advertised packages: unknown"),
        }
        println!("packages read: {}", self.registry_packages);
        println!("packages/sec: {:.2}", self.registry_packages as f32 / secs);
        println!("distinct packages: {}", self.scored_packages);
        println!("packages over threshold: {}", self.ranked_packages);
        println!("keywords written: {}", self.keywords);
        println!("output: {}", self.output.display());
    }
}

/// Runs one build on a fresh current-thread runtime.
pub fn run(controls: BuildControls) -> Result<BuildReport> {
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(PipelineError::Runtime)?;
    rt.block_on(build_keyword_entities(&controls, |total| {
        tracing::info!(total, "registry size announced");
    }))
}

/// Streams the registry source through every stage and writes the entity
/// type to `controls.output()`.
///
/// `on_registry_size` runs at most once, before any record is aggregated,
/// when the source advertises its entry count. Nothing is written unless
/// every earlier stage succeeded.
pub async fn build_keyword_entities<F>(
    controls: &BuildControls,
    mut on_registry_size: F,
) -> Result<BuildReport>
where
    F: FnMut(usize),
{
    let start = Instant::now();
    let location = SourceLocation::resolve(controls.source(), controls.fetch_from_disk())?;
    let client = http_client()?;
    let stream = open_source(&location, &client).await?;
    tracing::info!(source = %location, remote = location.is_remote(), "reading registry");

    let (mut tx, rx) = mpsc::channel::<ParseEvent>(RECORD_CHANNEL_CAPACITY);
    let parser = RecordParser::new(location.to_string());
    let reader = SyncIoBridge::new(stream);
    let parse_task = spawn_blocking(move || parser.parse(reader, &mut tx));

    let mut expected_packages = None;
    let registry = aggregate_registry(rx, parse_task, |total| {
        expected_packages = Some(total);
        on_registry_size(total);
    })
    .await?;
    let registry_packages = registry.len();

    let scored = compute_dependents(registry);
    let scored_packages = scored.len();
    let ranked = filter_and_rank(scored, controls.min_dependents());
    let ranked_packages = ranked.len();
    tracing::debug!(
        scored_packages,
        ranked_packages,
        min_dependents = controls.min_dependents(),
        "packages ranked"
    );

    let keywords = rank_keywords(&ranked, controls.max_keywords());
    let document = EntityTypeDocument::new(controls.entity_type_name(), to_entities(keywords));
    write_document(controls.output(), &document)?;

    Ok(BuildReport {
        expected_packages,
        registry_packages,
        scored_packages,
        ranked_packages,
        keywords: document.entries.len(),
        output: controls.output().to_path_buf(),
        elapsed: start.elapsed(),
    })
}

fn write_document(path: &Path, document: &EntityTypeDocument) -> Result<()> {
    save_entity_type(path, document).inspect_err(|err| {
        tracing::error!(path = %path.display(), %err, "entity type not written");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn controls_for(dir: &Path, doc: &str) -> BuildControls {
        let source = dir.join("registry.json");
        fs::write(&source, doc).expect("write source");
        BuildControls::default()
            .with_source(source.to_string_lossy().into_owned())
            .with_min_dependents(0)
            .with_max_keywords(10)
            .with_output(dir.join("out/keywords.json"))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn report_tracks_each_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controls = controls_for(
            dir.path(),
            r#"{"total_rows": 3, "rows": [
                {"key": "core", "value": {"keywords": ["base"]}},
                {"key": "app", "value": {"dependencies": {"core": "1"}}},
                {"key": "core", "value": {"keywords": ["base"]}}
            ]}"#,
        );

        let mut announced = Vec::new();
        let report = build_keyword_entities(&controls, |total| announced.push(total))
            .await
            .expect("build");

        assert_eq!(announced, vec![3]);
        assert_eq!(report.expected_packages, Some(3));
        assert_eq!(report.registry_packages, 3);
        assert_eq!(report.scored_packages, 2);
        assert_eq!(report.ranked_packages, 1);
        assert_eq!(report.keywords, 2);
        assert_eq!(report.output, controls.output());
        assert!(controls.output().exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_source_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controls = controls_for(dir.path(), r#"{"rows": [ {"key": "a"#);

        let err = build_keyword_entities(&controls, |_| {})
            .await
            .expect_err("truncated");
        assert!(matches!(err, PipelineError::MalformedDocument(_)));
        assert!(!controls.output().exists());
    }

    #[test]
    fn run_builds_its_own_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controls = controls_for(dir.path(), r#"{"rows": {}}"#);
        let report = run(controls).expect("build");
        assert_eq!(report.registry_packages, 0);
        assert_eq!(report.keywords, 0);
    }
}
