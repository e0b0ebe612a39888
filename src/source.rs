//! Registry source selection and byte streaming.
//!
//! A source is either a file on disk or a remote HTTP(S) resource. Both are
//! exposed as the same [`SourceStream`] so the parser never needs to know
//! where the bytes come from.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use futures_util::TryStreamExt;
use reqwest::Client;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::{PipelineError, Result};

pub(crate) const USER_AGENT: &str = concat!("registry-keywords/", env!("CARGO_PKG_VERSION"));

/// Byte stream over a registry dump, regardless of origin.
pub type SourceStream = Pin<Box<dyn AsyncRead + Send>>;

/// Where a registry dump lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A path on the local filesystem.
    Local(PathBuf),
    /// An absolute `http`/`https` URL.
    Remote(Url),
}

impl SourceLocation {
    /// Picks local or remote handling for `location`.
    ///
    /// `fetch_from_disk` overrides the decision; when it is `None` anything
    /// starting with `http://` or `https://` is fetched remotely.
    pub fn resolve(location: &str, fetch_from_disk: Option<bool>) -> Result<Self> {
        let from_disk = fetch_from_disk.unwrap_or_else(|| !is_remote_location(location));
        if from_disk {
            return Ok(Self::Local(PathBuf::from(location)));
        }
        let url = Url::parse(location).map_err(|err| {
            PipelineError::source_unavailable(
                location,
                io::Error::new(io::ErrorKind::InvalidInput, err),
            )
        })?;
        Ok(Self::Remote(url))
    }

    /// Returns true when bytes come over the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Returns true for locations using an HTTP or HTTPS scheme.
pub fn is_remote_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Builds the HTTP client used to download registry dumps.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(PipelineError::HttpClient)
}

/// Opens `location` and returns its bytes as a stream.
///
/// Remote bodies are forwarded chunk by chunk as they arrive; nothing is
/// buffered beyond the current chunk.
pub async fn open_source(location: &SourceLocation, client: &Client) -> Result<SourceStream> {
    match location {
        SourceLocation::Local(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|err| PipelineError::source_unavailable(location.to_string(), err))?;
            tracing::debug!(path = %path.display(), "opened local registry dump");
            Ok(Box::pin(file))
        }
        SourceLocation::Remote(url) => {
            let response = client
                .get(url.clone())
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|err| {
                    PipelineError::source_unavailable(url.as_str(), io::Error::other(err))
                })?;
            tracing::debug!(
                %url,
                status = %response.status(),
                content_length = ?response.content_length(),
                "streaming remote registry dump"
            );
            let body = response.bytes_stream().map_err(io::Error::other);
            Ok(Box::pin(StreamReader::new(body)))
        }
    }
}
