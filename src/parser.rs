//! Incremental parsing of registry dumps.
//!
//! The dump is one JSON object whose entries live under `rows`. The parser
//! walks it with a streaming `serde_json` visitor: top-level fields other than
//! the entry count are skipped without being materialized, and each entry is
//! decoded, handed to a [`RecordSink`], and dropped before the next one is
//! read. Memory stays bounded by the largest single entry plus the read
//! buffer.
//!
//! Two row layouts are accepted under `rows`:
//!
//! * an array of CouchDB view rows, `{"id": .., "key": <name>, "value": {..}}`;
//! * an object mapping entry names to entry values.

use std::fmt;
use std::io::{self, BufReader, Read};

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserializer;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};

/// Top-level field announcing how many rows follow.
pub const COUNT_FIELD: &str = "total_rows";
/// Top-level field holding the registry entries.
pub const ROWS_FIELD: &str = "rows";
/// Size of the read-ahead buffer between the byte source and the tokenizer.
pub const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// Keyword field as it appears in a raw entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawKeywords {
    /// A lone keyword string.
    Single(String),
    /// An array of keywords. Non-string elements are dropped while parsing.
    List(Vec<String>),
    /// Missing, null, or any other shape.
    #[default]
    Absent,
}

impl RawKeywords {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::String(keyword)) => Self::Single(keyword),
            Some(Value::Array(items)) => Self::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(keyword) => Some(keyword),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::Absent,
        }
    }
}

/// One registry entry as found in the dump.
///
/// Dependency maps keep their version specifiers only because they arrive
/// that way; nothing downstream reads them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    /// Entry key, used as the package name.
    pub name: String,
    /// Raw keyword field.
    pub keywords: RawKeywords,
    /// `dependencies` map.
    pub dependencies: Map<String, Value>,
    /// `devDependencies` map.
    pub dev_dependencies: Map<String, Value>,
    /// `peerDependencies` map.
    pub peer_dependencies: Map<String, Value>,
    /// `optionalDependencies` map.
    pub optional_dependencies: Map<String, Value>,
}

impl RawRecord {
    /// Builds a record from an entry key and its value.
    ///
    /// Shapes that do not match are degraded to empty fields instead of
    /// failing: a non-object value yields a record carrying only `name`.
    pub fn from_entry(name: String, value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self {
                name,
                ..Self::default()
            };
        };
        Self {
            name,
            keywords: RawKeywords::from_value(fields.remove("keywords")),
            dependencies: take_map(&mut fields, "dependencies"),
            dev_dependencies: take_map(&mut fields, "devDependencies"),
            peer_dependencies: take_map(&mut fields, "peerDependencies"),
            optional_dependencies: take_map(&mut fields, "optionalDependencies"),
        }
    }

    /// Dependency maps in union order: runtime, dev, peer, optional.
    pub fn dependency_maps(&self) -> [&Map<String, Value>; 4] {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
        ]
    }
}

fn take_map(fields: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match fields.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Message sent from the parser to the registry aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// Entry count advertised by the document. Sent at most once, first.
    ExpectedRecords(usize),
    /// One parsed entry, in document order.
    Record(RawRecord),
}

/// Receives parser output as it is produced.
pub trait RecordSink {
    /// Called at most once, before any record, when the document advertises
    /// its entry count ahead of the rows.
    fn expected_records(&mut self, total: usize) -> Result<()>;

    /// Called once per entry in document order.
    fn record(&mut self, record: RawRecord) -> Result<()>;
}

impl RecordSink for mpsc::Sender<ParseEvent> {
    fn expected_records(&mut self, total: usize) -> Result<()> {
        self.blocking_send(ParseEvent::ExpectedRecords(total))
            .map_err(|_| PipelineError::ConsumerClosed)
    }

    fn record(&mut self, record: RawRecord) -> Result<()> {
        self.blocking_send(ParseEvent::Record(record))
            .map_err(|_| PipelineError::ConsumerClosed)
    }
}

/// Counts reported once the whole document has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseSummary {
    /// Entry count announced ahead of the rows, if any.
    pub expected: Option<usize>,
    /// Number of records handed to the sink.
    pub records: usize,
}

/// Streaming parser for one registry dump.
#[derive(Debug, Clone)]
pub struct RecordParser {
    location: String,
    buffer_capacity: usize,
}

impl RecordParser {
    /// Creates a parser; `location` only labels IO errors.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            buffer_capacity: READ_BUFFER_CAPACITY,
        }
    }

    /// Overrides the read-ahead buffer size.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Consumes `reader` to the end, pushing every entry into `sink`.
    ///
    /// Blocks on `reader`; async callers run this on a blocking task.
    pub fn parse<R, S>(&self, reader: R, sink: &mut S) -> Result<ParseSummary>
    where
        R: Read,
        S: RecordSink,
    {
        let reader = BufReader::with_capacity(self.buffer_capacity, reader);
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let mut state = ParseState::new(sink);
        let outcome = Document(&mut state)
            .deserialize(&mut deserializer)
            .and_then(|()| deserializer.end());

        if let Some(err) = state.aborted.take() {
            return Err(err);
        }
        outcome.map_err(|err| self.classify(err))?;

        Ok(ParseSummary {
            expected: state.expected,
            records: state.records,
        })
    }

    fn classify(&self, err: serde_json::Error) -> PipelineError {
        if err.is_io() {
            PipelineError::source_unavailable(self.location.clone(), io::Error::from(err))
        } else {
            PipelineError::MalformedDocument(err)
        }
    }
}

struct ParseState<'s, S> {
    sink: &'s mut S,
    expected: Option<usize>,
    rows_seen: bool,
    records: usize,
    aborted: Option<PipelineError>,
}

impl<'s, S: RecordSink> ParseState<'s, S> {
    fn new(sink: &'s mut S) -> Self {
        Self {
            sink,
            expected: None,
            rows_seen: false,
            records: 0,
            aborted: None,
        }
    }

    fn announce<E: de::Error>(&mut self, total: usize) -> std::result::Result<(), E> {
        self.expected = Some(total);
        tracing::debug!(total, "registry advertised its entry count");
        self.sink.expected_records(total).map_err(|err| self.abort(err))
    }

    fn emit<E: de::Error>(&mut self, record: RawRecord) -> std::result::Result<(), E> {
        match self.sink.record(record) {
            Ok(()) => {
                self.records += 1;
                Ok(())
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    fn abort<E: de::Error>(&mut self, err: PipelineError) -> E {
        let message = err.to_string();
        self.aborted = Some(err);
        E::custom(message)
    }
}

struct Document<'a, 's, S>(&'a mut ParseState<'s, S>);

impl<'de, S: RecordSink> DeserializeSeed<'de> for Document<'_, '_, S> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for Document<'_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a registry document object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let state = self.0;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                COUNT_FIELD if !state.rows_seen && state.expected.is_none() => {
                    let total: Value = map.next_value()?;
                    if let Some(total) = total.as_u64().and_then(|n| usize::try_from(n).ok()) {
                        state.announce::<A::Error>(total)?;
                    }
                }
                ROWS_FIELD => {
                    map.next_value_seed(Rows(&mut *state))?;
                    state.rows_seen = true;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

struct Rows<'a, 's, S>(&'a mut ParseState<'s, S>);

impl<'de, S: RecordSink> DeserializeSeed<'de> for Rows<'_, '_, S> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for Rows<'_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of view rows or a map of registry entries")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(row) = seq.next_element::<Value>()? {
            let (name, value) = split_view_row(row);
            self.0.emit::<A::Error>(RawRecord::from_entry(name, value))?;
        }
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(name) = map.next_key::<String>()? {
            let value: Value = map.next_value()?;
            self.0.emit::<A::Error>(RawRecord::from_entry(name, value))?;
        }
        Ok(())
    }
}

fn split_view_row(row: Value) -> (String, Value) {
    match row {
        Value::Object(mut fields) => {
            let name = entry_name(fields.remove("key").unwrap_or(Value::Null));
            let value = fields.remove("value").unwrap_or(Value::Null);
            (name, value)
        }
        other => (String::new(), other),
    }
}

fn entry_name(key: Value) -> String {
    match key {
        Value::String(name) => name,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
