//! Module: db::search
//! Responsibility: the search index boundary, the query grammar, and the
//! in-memory index.
//! Does not own: document shape (see `db::entity::index`).
//!
//! Invariants:
//! - The index is eventually consistent with storage. Callers tolerate
//!   persisted-but-unindexed objects and hits for objects storage no longer
//!   holds.
//! - Every value interpolated into a query is escaped by the builders in
//!   `query`.

mod memory;
mod parse;
pub mod query;


pub use memory::{MemorySearch, QueryLogEntry};
pub use parse::{QueryNode, QueryParseError, parse_query};

use std::collections::{BTreeMap, btree_map::Entry};
use thiserror::Error as ThisError;

/// Reserved primary-key field.
pub const ID_FIELD: &str = "id";

/// Multi-valued type assertion field.
pub const HAS_MODEL_FIELD: &str = "has_model_ssim";

///
/// SearchError
///

#[derive(Debug, ThisError)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] QueryParseError),

    #[error("invalid index document: {message}")]
    InvalidDocument { message: String },

    #[error("search index unavailable: {message}")]
    Unavailable { message: String },
}

///
/// SearchClient
///
/// Narrow interface onto the search engine. Like storage, implementations use
/// interior mutability.
///

pub trait SearchClient {
    /// Matching documents in index order, capped by `options.rows`.
    fn query(&self, query: &str, options: &QueryOptions) -> Result<Vec<SolrDocument>, SearchError>;

    fn count(&self, query: &str) -> Result<usize, SearchError>;

    /// Add or replace the document with the same `id`.
    fn add(&self, document: SolrDocument, options: AddOptions) -> Result<(), SearchError>;

    fn delete_by_id(&self, id: &str) -> Result<(), SearchError>;

    /// Make every pending add and delete visible to queries.
    fn commit(&self) -> Result<(), SearchError>;
}

///
/// QueryOptions
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryOptions {
    pub rows: Option<usize>,
    /// `<field> asc|desc`
    pub sort: Option<String>,
}

impl QueryOptions {
    #[must_use]
    pub const fn rows(rows: usize) -> Self {
        Self {
            rows: Some(rows),
            sort: None,
        }
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

///
/// AddOptions
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AddOptions {
    pub commit: bool,
}

///
/// FieldValue
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }
}

///
/// SolrDocument
///
/// Flattened index document: field name to a scalar or multi-value.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SolrDocument {
    fields: BTreeMap<String, FieldValue>,
}

impl SolrDocument {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let mut doc = Self::default();
        doc.set(ID_FIELD, id);

        doc
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.first(ID_FIELD)
    }

    /// Set a single-valued field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(field.into(), FieldValue::Single(value.into()));
    }

    /// Append to a multi-valued field.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.fields.entry(field.into()) {
            Entry::Vacant(slot) => {
                slot.insert(FieldValue::Multi(vec![value]));
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                match current {
                    FieldValue::Multi(values) => values.push(value),
                    FieldValue::Single(existing) => {
                        let first = std::mem::take(existing);
                        *current = FieldValue::Multi(vec![first, value]);
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::first)
    }

    #[must_use]
    pub fn values(&self, field: &str) -> Vec<&str> {
        self.fields.get(field).map_or_else(Vec::new, FieldValue::values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
