//! Entity type documents built from ranked keywords.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// One entity entry; synonyms currently mirror the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntity {
    /// Canonical keyword.
    pub value: String,
    /// Alternative spellings, always `[value]` today.
    pub synonyms: Vec<String>,
}

impl KeywordEntity {
    /// Wraps a keyword with itself as the only synonym.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            synonyms: vec![value.clone()],
            value,
        }
    }
}

/// Entity type accepted by the chatbot agent import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDocument {
    /// Fresh identifier per build.
    pub id: Uuid,
    /// Entity type name, e.g. `npmKeyword`.
    pub name: String,
    /// Always true.
    pub is_overridable: bool,
    /// Always false.
    pub is_enum: bool,
    /// Always true.
    pub automated_expansion: bool,
    /// Ranked entries.
    pub entries: Vec<KeywordEntity>,
}

impl EntityTypeDocument {
    /// Builds a document with a new v4 id and the fixed flags.
    pub fn new(name: impl Into<String>, entries: Vec<KeywordEntity>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_overridable: true,
            is_enum: false,
            automated_expansion: true,
            entries,
        }
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Maps ranked keywords to entities, preserving order.
pub fn to_entities<I, S>(keywords: I) -> Vec<KeywordEntity>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keywords.into_iter().map(KeywordEntity::new).collect()
}

/// Writes `document` to `path` atomically.
///
/// The JSON is written to a temporary file next to `path` and renamed into
/// place, so readers never observe a partial artifact. Missing parent
/// directories are created.
pub fn save_entity_type(path: &Path, document: &EntityTypeDocument) -> Result<()> {
    let write_err = |err: io::Error| PipelineError::write_failure(path, err);
    let json = document
        .to_pretty_json()
        .map_err(|err| write_err(err.into()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(json.as_bytes()).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;

    tracing::info!(
        path = %path.display(),
        entries = document.entries.len(),
        id = %document.id,
        "entity type written"
    );
    Ok(())
}
