#![warn(missing_docs)]
//! Builds a ranked npm keyword entity type from a registry dump and serves
//! the Dialogflow webhook that answers package lookups.

pub mod controls;
pub mod entities;
pub mod error;
pub mod keywords;
pub mod normalizer;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod webhook;

pub use controls::{BuildControls, Cli};
pub use entities::{save_entity_type, to_entities, EntityTypeDocument, KeywordEntity};
pub use error::{PipelineError, Result};
pub use keywords::{is_valid_keyword, keyword_frequencies, rank_keywords};
pub use normalizer::{gather_dependencies, normalize, normalize_keywords, split_keyword};
pub use parser::{ParseEvent, ParseSummary, RawKeywords, RawRecord, RecordParser, RecordSink};
pub use registry::{
    aggregate_registry, compute_dependents, filter_and_rank, Package, Registry,
    RegistryAggregator, ScoredPackage,
};
pub use runtime::{build_keyword_entities, run as run_build, BuildReport};
pub use source::{is_remote_location, open_source, SourceLocation, SourceStream};
