//! Build configuration shared by the library runner and the CLI.

use std::path::{Path, PathBuf};

use clap::Parser;

/// Registry view listing every package with its metadata.
pub const DEFAULT_REGISTRY_SOURCE: &str =
    "https://skimdb.npmjs.com/registry/_design/scratch/_view/byField";
/// Packages need strictly more dependents than this to contribute keywords.
pub const DEFAULT_MIN_DEPENDENTS: usize = 10;
/// Upper bound on emitted keywords.
pub const DEFAULT_MAX_KEYWORDS: usize = 10_000;
/// Where the entity type lands by default.
pub const DEFAULT_OUTPUT: &str = "data/npmKeywordData.json";
/// Entity type name expected by the chatbot agent.
pub const DEFAULT_ENTITY_TYPE_NAME: &str = "npmKeyword";

/// Knobs for one registry build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildControls {
    source: String,
    fetch_from_disk: Option<bool>,
    min_dependents: usize,
    max_keywords: usize,
    output: PathBuf,
    entity_type_name: String,
}

impl BuildControls {
    /// Constructs a full set of build controls.
    pub fn new(
        source: impl Into<String>,
        fetch_from_disk: Option<bool>,
        min_dependents: usize,
        max_keywords: usize,
        output: impl Into<PathBuf>,
        entity_type_name: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            fetch_from_disk,
            min_dependents,
            max_keywords,
            output: output.into(),
            entity_type_name: entity_type_name.into(),
        }
    }

    /// Path or URL of the registry dump.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Explicit local/remote decision, when one was given.
    pub fn fetch_from_disk(&self) -> Option<bool> {
        self.fetch_from_disk
    }

    /// Exclusive lower bound on dependents.
    pub fn min_dependents(&self) -> usize {
        self.min_dependents
    }

    /// Maximum number of keywords kept.
    pub fn max_keywords(&self) -> usize {
        self.max_keywords
    }

    /// Destination of the entity type document.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Name given to the entity type.
    pub fn entity_type_name(&self) -> &str {
        &self.entity_type_name
    }

    /// Replaces the source location.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Forces local (`true`) or remote (`false`) handling of the source.
    pub fn with_fetch_from_disk(mut self, fetch_from_disk: bool) -> Self {
        self.fetch_from_disk = Some(fetch_from_disk);
        self
    }

    /// Replaces the dependents threshold.
    pub fn with_min_dependents(mut self, min_dependents: usize) -> Self {
        self.min_dependents = min_dependents;
        self
    }

    /// Replaces the keyword cap.
    pub fn with_max_keywords(mut self, max_keywords: usize) -> Self {
        self.max_keywords = max_keywords;
        self
    }

    /// Replaces the output path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Replaces the entity type name.
    pub fn with_entity_type_name(mut self, name: impl Into<String>) -> Self {
        self.entity_type_name = name.into();
        self
    }
}

impl Default for BuildControls {
    fn default() -> Self {
        Self {
            source: DEFAULT_REGISTRY_SOURCE.to_string(),
            fetch_from_disk: None,
            min_dependents: DEFAULT_MIN_DEPENDENTS,
            max_keywords: DEFAULT_MAX_KEYWORDS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            entity_type_name: DEFAULT_ENTITY_TYPE_NAME.to_string(),
        }
    }
}

/// Command-line interface for the keyword entity builder.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "keyword-entities",
    about = "Builds a ranked npm keyword entity type from a registry dump"
)]
pub struct Cli {
    /// Registry dump location: a local path or an http(s) URL
    #[arg(long, env = "NPM_KEYWORDS_SOURCE", default_value = DEFAULT_REGISTRY_SOURCE)]
    pub source: String,

    /// Read the source from disk even when it looks like a URL
    #[arg(long, conflicts_with = "remote")]
    pub local: bool,

    /// Fetch the source over HTTP even when it does not look like a URL
    #[arg(long)]
    pub remote: bool,

    /// Packages need strictly more dependents than this
    #[arg(long, env = "NPM_KEYWORDS_MIN_DEPENDENTS", default_value_t = DEFAULT_MIN_DEPENDENTS)]
    pub min_dependents: usize,

    /// Maximum number of keywords in the entity type
    #[arg(long, env = "NPM_KEYWORDS_MAX_KEYWORDS", default_value_t = DEFAULT_MAX_KEYWORDS)]
    pub max_keywords: usize,

    /// Output path of the entity type document
    #[arg(long, env = "NPM_KEYWORDS_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Entity type name
    #[arg(long, env = "NPM_KEYWORDS_ENTITY_NAME", default_value = DEFAULT_ENTITY_TYPE_NAME)]
    pub entity_type_name: String,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Converts the parsed CLI into `BuildControls`.
    pub fn build_controls(&self) -> BuildControls {
        BuildControls::new(
            self.source.clone(),
            self.fetch_override(),
            self.min_dependents,
            self.max_keywords,
            self.output.clone(),
            self.entity_type_name.clone(),
        )
    }

    fn fetch_override(&self) -> Option<bool> {
        match (self.local, self.remote) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}
