//! Error type shared by every stage of the registry build.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for results produced by the build pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures that abort a registry build.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source could not be opened, fetched, or read to the end.
    #[error("registry source {location} unavailable: {source}")]
    SourceUnavailable {
        /// Path or URL of the registry dump.
        location: String,
        /// Underlying IO or transport failure.
        #[source]
        source: io::Error,
    },

    /// The top-level JSON document could not be parsed.
    #[error("registry document is malformed: {0}")]
    MalformedDocument(#[source] serde_json::Error),

    /// The entity type artifact could not be written.
    #[error("failed to write entity type to {}: {source}", path.display())]
    WriteFailure {
        /// Destination of the artifact.
        path: PathBuf,
        /// Underlying filesystem failure.
        #[source]
        source: io::Error,
    },

    /// The HTTP client used for remote sources could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The async runtime driving the build could not start.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The blocking parser task panicked or was cancelled.
    #[error("record parser task failed: {0}")]
    ParserTask(#[from] tokio::task::JoinError),

    /// The record consumer stopped listening before the parser finished.
    #[error("record consumer closed before the registry stream ended")]
    ConsumerClosed,
}

impl PipelineError {
    pub(crate) fn source_unavailable(location: impl Into<String>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            source,
        }
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}
