//! Module: db::store
//! Responsibility: the repository storage boundary (identifier minting and
//! per-object datastream persistence).
//! Does not own: index documents or association state.
//!
//! Invariants:
//! - Every call is a discrete, non-atomic round trip; partial failure is
//!   surfaced, never rolled back.
//! - `delete` and `fetch` report absence as `StoreError::NotFound`.

mod memory;

pub use memory::{MemoryStorage, StorageCallReport};

use crate::{rdf::Graph, types::Pid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use time::OffsetDateTime;

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("unable to find '{pid}' in the repository")]
    NotFound { pid: Pid },

    #[error("failed to mint identifier in namespace '{namespace}': {message}")]
    MintFailed { namespace: String, message: String },

    #[error("repository unavailable: {message}")]
    Unavailable { message: String },
}

///
/// StorageClient
///
/// Narrow interface onto the repository. Implementations use interior
/// mutability; the runtime is single-threaded and request-scoped.
///

pub trait StorageClient {
    /// Allocate a fresh identifier under `namespace`.
    fn mint_identifier(&self, namespace: &str) -> Result<Pid, StoreError>;

    fn fetch(&self, pid: &Pid) -> Result<ObjectRecord, StoreError>;

    /// Persist the object profile and the supplied datastreams.
    /// Returns true when the object did not previously exist.
    fn save(&self, pid: &Pid, request: &SaveRequest) -> Result<bool, StoreError>;

    fn delete(&self, pid: &Pid) -> Result<(), StoreError>;

    fn exists(&self, pid: &Pid) -> Result<bool, StoreError> {
        match self.fetch(pid) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

///
/// ObjectProfile
///
/// System metadata kept alongside every object.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ObjectProfile {
    pub label: Option<String>,
    pub owner_id: Option<String>,
    pub state: ObjectState,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
}

impl ObjectProfile {
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            label: None,
            owner_id: None,
            state: ObjectState::Active,
            created: now,
            modified: now,
        }
    }
}

///
/// ObjectState
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ObjectState {
    #[default]
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "I")]
    Inactive,
    #[serde(rename = "D")]
    Deleted,
}

///
/// DatastreamPayload
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DatastreamPayload {
    Bytes(Vec<u8>),
    Graph(Graph),
}

impl DatastreamPayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Graph(graph) => graph.is_empty(),
        }
    }
}

///
/// DatastreamWrite
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatastreamWrite {
    pub label: String,
    pub mime_type: String,
    pub content: DatastreamPayload,
}

///
/// SaveRequest
///
/// One object save: the profile plus every changed datastream. Datastreams
/// absent from the request are left untouched in storage.
///

#[derive(Clone, Debug)]
pub struct SaveRequest {
    pub profile: ObjectProfile,
    pub datastreams: BTreeMap<String, DatastreamWrite>,
}

///
/// StoredDatastream
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredDatastream {
    pub dsid: String,
    pub label: String,
    pub mime_type: String,
    /// Starts at 1 and increments on every write.
    pub version: u32,
    pub content: DatastreamPayload,
}

///
/// ObjectRecord
/// Result of a fetch: profile plus the datastream directory.
///

#[derive(Clone, Debug)]
pub struct ObjectRecord {
    pub pid: Pid,
    pub profile: ObjectProfile,
    pub datastreams: BTreeMap<String, StoredDatastream>,
}

impl ObjectRecord {
    #[must_use]
    pub fn graph(&self, dsid: &str) -> Option<&Graph> {
        match self.datastreams.get(dsid).map(|ds| &ds.content) {
            Some(DatastreamPayload::Graph(graph)) => Some(graph),
            _ => None,
        }
    }
}
