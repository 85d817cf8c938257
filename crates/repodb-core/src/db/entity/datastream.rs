use crate::{
    db::store::{DatastreamPayload, DatastreamWrite, StoredDatastream},
    model::{DatastreamKind, DatastreamModel},
    rdf::Graph,
};

///
/// Datastream
///
/// A sub-resource owned by exactly one entity. Tracks its own
/// content-changed flag, separate from the entity's dirty attribute set.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datastream {
    dsid: String,
    kind: DatastreamKind,
    label: String,
    mime_type: String,
    content: DatastreamPayload,
    changed: bool,
    /// Stored version; `None` until first saved.
    version: Option<u32>,
}

impl Datastream {
    /// Empty datastream for a declared model entry.
    #[must_use]
    pub fn declared(model: &DatastreamModel) -> Self {
        let content = match model.kind {
            DatastreamKind::Metadata => DatastreamPayload::Graph(Graph::new()),
            DatastreamKind::File => DatastreamPayload::Bytes(Vec::new()),
        };

        Self {
            dsid: model.dsid.to_string(),
            kind: model.kind,
            label: model.label.to_string(),
            mime_type: model.mime_type.to_string(),
            content,
            changed: false,
            version: None,
        }
    }

    /// Datastream discovered in storage.
    #[must_use]
    pub fn stored(stored: &StoredDatastream) -> Self {
        let kind = match stored.content {
            DatastreamPayload::Graph(_) => DatastreamKind::Metadata,
            DatastreamPayload::Bytes(_) => DatastreamKind::File,
        };

        Self {
            dsid: stored.dsid.clone(),
            kind,
            label: stored.label.clone(),
            mime_type: stored.mime_type.clone(),
            content: stored.content.clone(),
            changed: false,
            version: Some(stored.version),
        }
    }

    #[must_use]
    pub fn dsid(&self) -> &str {
        &self.dsid
    }

    #[must_use]
    pub const fn kind(&self) -> DatastreamKind {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn content(&self) -> &DatastreamPayload {
        &self.content
    }

    #[must_use]
    pub const fn graph(&self) -> Option<&Graph> {
        match &self.content {
            DatastreamPayload::Graph(graph) => Some(graph),
            DatastreamPayload::Bytes(_) => None,
        }
    }

    #[must_use]
    pub const fn is_changed(&self) -> bool {
        self.changed
    }

    #[must_use]
    pub const fn version(&self) -> Option<u32> {
        self.version
    }

    pub(crate) fn set_content(&mut self, content: DatastreamPayload) {
        if self.content != content {
            self.content = content;
            self.changed = true;
        }
    }

    /// Mutable graph access; marks the datastream changed.
    pub(crate) fn graph_mut(&mut self) -> Option<&mut Graph> {
        match &mut self.content {
            DatastreamPayload::Graph(graph) => {
                self.changed = true;
                Some(graph)
            }
            DatastreamPayload::Bytes(_) => None,
        }
    }

    pub(crate) fn to_write(&self) -> DatastreamWrite {
        DatastreamWrite {
            label: self.label.clone(),
            mime_type: self.mime_type.clone(),
            content: self.content.clone(),
        }
    }

    pub(crate) fn mark_saved(&mut self) {
        self.changed = false;
        self.version = Some(self.version.map_or(1, |v| v + 1));
    }
}
