//! Module: db::entity
//! Responsibility: in-memory entity state (identity, lifecycle, attributes,
//! dirty tracking, datastreams, association cache).
//! Does not own: storage or index round trips (see `db::persistence`).
//!
//! Invariants:
//! - A `New` entity has no identifier; once assigned an identifier never
//!   changes.
//! - Attribute values always match the declared shape (single vs list, kind).
//! - RELS-EXT is the durable form of attributes; it is rewritten from the
//!   change set during persistence, never edited directly by callers.

mod change_set;
mod datastream;
mod index;


pub use change_set::ChangeSet;
pub use datastream::Datastream;
pub use index::{
    CREATED_FIELD, IndexProfile, MODEL_NAME_FIELD, MODIFIED_FIELD, PROFILE_FIELD,
    property_field,
};

use crate::{
    db::{
        association::AssociationCache,
        store::{DatastreamPayload, ObjectProfile, ObjectRecord},
    },
    error::InternalError,
    model::{AttributeDef, EntityModel, MappingError, PropertyKind, RELS_EXT},
    rdf::{Graph, Literal, Term},
    types::{Field, Pid, UriTranslator},
    value::{AttributeValue, Value},
};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// Subject placeholder for metadata statements written before an identifier
/// has been minted; rewritten to the object URI on create.
pub const SELF_SUBJECT: &str = "_:self";

///
/// EntityState
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EntityState {
    #[default]
    New,
    Persisted,
    Destroyed,
}

///
/// Hydration
///
/// `Partial` entities were reified from an index document and have no
/// datastream content until hydrated from storage.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Hydration {
    #[default]
    Full,
    Partial,
}

///
/// Entity
///

#[derive(Clone, Debug)]
pub struct Entity {
    model: &'static EntityModel,
    pid: Option<Pid>,
    namespace: Option<String>,
    state: EntityState,
    profile: Option<ObjectProfile>,
    attributes: BTreeMap<&'static str, Value>,
    changed: BTreeSet<&'static str>,
    /// RELS-EXT content; kept apart from `datastreams`.
    relationships: Graph,
    relationships_changed: bool,
    datastreams: BTreeMap<String, Datastream>,
    associations: AssociationCache,
    hydration: Hydration,
    frozen: bool,
}

impl Entity {
    /// Fresh, unsaved entity with every declared datastream created empty.
    #[must_use]
    pub fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            pid: None,
            namespace: None,
            state: EntityState::New,
            profile: None,
            attributes: default_attributes(model),
            changed: BTreeSet::new(),
            relationships: Graph::new(),
            relationships_changed: false,
            datastreams: declared_datastreams(model),
            associations: AssociationCache::default(),
            hydration: Hydration::Full,
            frozen: false,
        }
    }

    /// Persisted entity built from a storage fetch.
    pub(crate) fn from_record(
        model: &'static EntityModel,
        record: &ObjectRecord,
        translator: &dyn UriTranslator,
    ) -> Self {
        let mut entity = Self::new(model);
        entity.load_record(record, translator);

        entity
    }

    /// Replace identity, profile, datastreams, and attributes with `record`.
    pub(crate) fn load_record(&mut self, record: &ObjectRecord, translator: &dyn UriTranslator) {
        let subject = translator.id_to_uri(&record.pid);

        let mut datastreams = declared_datastreams(self.model);
        for (dsid, stored) in &record.datastreams {
            if dsid != RELS_EXT {
                datastreams.insert(dsid.clone(), Datastream::stored(stored));
            }
        }

        let graph = record.graph(RELS_EXT).cloned().unwrap_or_default();
        self.attributes = attributes_from_graph(self.model, &graph, &subject, translator);
        self.relationships = graph;
        self.relationships_changed = false;
        self.pid = Some(record.pid.clone());
        self.state = EntityState::Persisted;
        self.profile = Some(record.profile.clone());
        self.datastreams = datastreams;
        self.changed.clear();
        self.hydration = Hydration::Full;
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn pid(&self) -> Option<&Pid> {
        self.pid.as_ref()
    }

    #[must_use]
    pub const fn state(&self) -> EntityState {
        self.state
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self.state, EntityState::New)
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self.state, EntityState::Persisted)
    }

    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self.state, EntityState::Destroyed)
    }

    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self.hydration, Hydration::Partial)
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Reject further attribute and datastream mutation.
    pub const fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&ObjectProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.profile.as_ref().map(|p| p.created)
    }

    #[must_use]
    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        self.profile.as_ref().map(|p| p.modified)
    }

    /// Namespace override used when minting; only meaningful before create.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> Result<(), InternalError> {
        self.ensure_mutable()?;
        if !self.is_new() {
            return Err(InternalError::persistence_invariant(format!(
                "can't change the namespace of persisted {}",
                self.describe()
            )));
        }
        self.namespace = Some(namespace.into());

        Ok(())
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `Book test:1` or `new Book`, for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.pid {
            Some(pid) => format!("{} {pid}", self.model.name),
            None => format!("new {}", self.model.name),
        }
    }

    ///
    /// ATTRIBUTES
    ///

    pub fn get(&self, name: &str) -> Result<&Value, InternalError> {
        self.attributes.get(name).ok_or_else(|| {
            MappingError::UnknownAttribute {
                model: self.model.name,
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Set an attribute. Setting a foreign key resets the association caches
    /// that depend on it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), InternalError> {
        let attribute = self.attribute_def(name)?;
        let changed = self.write_attribute(attribute, value.into())?;

        if changed && attribute.is_foreign_key() {
            for reflection in self.model.all_reflections() {
                if reflection.foreign_key == Some(attribute.name()) {
                    self.associations.reset(reflection.name);
                }
            }
        }

        Ok(())
    }

    /// Assign several attributes; stops at the first invalid one.
    pub fn assign<K, V>(
        &mut self,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), InternalError>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.set(name.as_ref(), value)?;
        }

        Ok(())
    }

    pub fn read<T: AttributeValue>(&self, field: Field<T>) -> Result<T, InternalError> {
        let value = self.get(field.name())?;

        T::from_value(value).ok_or_else(|| {
            MappingError::AttributeShape {
                model: self.model.name,
                name: field.name(),
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
    }

    pub fn write<T: AttributeValue>(
        &mut self,
        field: Field<T>,
        value: T,
    ) -> Result<(), InternalError> {
        self.set(field.name(), value.into_value())
    }

    /// Names of attributes changed since the last save or reload.
    pub fn changed_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.changed.iter().copied()
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
            || self.relationships_changed
            || self.datastreams.values().any(Datastream::is_changed)
    }

    #[must_use]
    pub fn attribute_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Single foreign-key identifier, if set.
    pub(crate) fn foreign_key_id(&self, name: &str) -> Option<Pid> {
        self.attributes
            .get(name)
            .and_then(|v| v.to_pids().into_iter().next())
    }

    /// Foreign-key identifier list, in stored order.
    pub(crate) fn foreign_key_ids(&self, name: &str) -> Vec<Pid> {
        self.attributes
            .get(name)
            .map_or_else(Vec::new, Value::to_pids)
    }

    /// Write an attribute without touching association caches. Association
    /// proxies use this when they keep their own cache consistent.
    pub(crate) fn write_raw(&mut self, name: &str, value: Value) -> Result<bool, InternalError> {
        let attribute = self.attribute_def(name)?;

        self.write_attribute(attribute, value)
    }

    fn attribute_def(&self, name: &str) -> Result<AttributeDef, InternalError> {
        self.model.attribute(name).ok_or_else(|| {
            MappingError::UnknownAttribute {
                model: self.model.name,
                name: name.to_string(),
            }
            .into()
        })
    }

    // Returns whether the stored value changed.
    fn write_attribute(
        &mut self,
        attribute: AttributeDef,
        value: Value,
    ) -> Result<bool, InternalError> {
        self.ensure_mutable()?;
        let value = conform(self.model, attribute, value)?;

        let name = attribute.name();
        if self.attributes.get(name) == Some(&value) {
            return Ok(false);
        }
        self.attributes.insert(name, value);
        self.changed.insert(name);

        Ok(true)
    }

    fn ensure_mutable(&self) -> Result<(), InternalError> {
        if self.is_destroyed() {
            return Err(InternalError::entity_destroyed(&self.describe()));
        }
        if self.frozen {
            return Err(InternalError::entity_frozen(&self.describe()));
        }

        Ok(())
    }

    ///
    /// DATASTREAMS
    ///

    #[must_use]
    pub fn datastream(&self, dsid: &str) -> Option<&Datastream> {
        self.datastreams.get(dsid)
    }

    pub fn datastreams(&self) -> impl Iterator<Item = &Datastream> {
        self.datastreams.values()
    }

    /// Statements currently held in RELS-EXT.
    #[must_use]
    pub const fn relationships(&self) -> &Graph {
        &self.relationships
    }

    /// Assign content to a declared (or previously stored) datastream.
    pub fn set_datastream_content(
        &mut self,
        dsid: &str,
        content: DatastreamPayload,
    ) -> Result<(), InternalError> {
        self.ensure_mutable()?;
        if dsid == RELS_EXT {
            return Err(InternalError::persistence_invariant(
                "RELS-EXT is maintained from attributes and can't be assigned directly",
            ));
        }

        let datastream = self.datastream_mut(dsid)?;
        datastream.set_content(content);

        Ok(())
    }

    /// Edit a metadata datastream's graph in place.
    pub fn update_graph(
        &mut self,
        dsid: &str,
        edit: impl FnOnce(&mut Graph),
    ) -> Result<(), InternalError> {
        self.ensure_mutable()?;
        if dsid == RELS_EXT {
            return Err(InternalError::persistence_invariant(
                "RELS-EXT is maintained from attributes and can't be edited directly",
            ));
        }

        let model = self.model.name;
        let graph = self.datastream_mut(dsid)?.graph_mut().ok_or_else(|| {
            InternalError::from(MappingError::UnknownDatastream {
                model,
                dsid: dsid.to_string(),
            })
        })?;
        edit(graph);

        Ok(())
    }

    fn datastream_mut(&mut self, dsid: &str) -> Result<&mut Datastream, InternalError> {
        let model = self.model.name;

        self.datastreams.get_mut(dsid).ok_or_else(|| {
            MappingError::UnknownDatastream {
                model,
                dsid: dsid.to_string(),
            }
            .into()
        })
    }

    pub(crate) fn changed_datastreams(&self) -> impl Iterator<Item = &Datastream> {
        self.datastreams.values().filter(|ds| ds.is_changed())
    }

    pub(crate) const fn relationships_changed(&self) -> bool {
        self.relationships_changed
    }

    pub(crate) const fn relationships_mut(&mut self) -> &mut Graph {
        self.relationships_changed = true;
        &mut self.relationships
    }

    /// Rewrite placeholder-subject statements in every metadata graph.
    pub(crate) fn resolve_self_subject(&mut self, uri: &str) {
        for datastream in self.datastreams.values_mut() {
            let pending = datastream
                .graph()
                .is_some_and(|graph| !graph.predicates(SELF_SUBJECT).is_empty());
            if pending && let Some(graph) = datastream.graph_mut() {
                graph.rename_subject(SELF_SUBJECT, uri);
            }
        }
    }

    ///
    /// ASSOCIATIONS
    ///

    #[must_use]
    pub const fn associations(&self) -> &AssociationCache {
        &self.associations
    }

    pub(crate) const fn associations_mut(&mut self) -> &mut AssociationCache {
        &mut self.associations
    }

    ///
    /// LIFECYCLE (persistence only)
    ///

    pub(crate) fn assign_pid(&mut self, pid: Pid) {
        self.pid = Some(pid);
    }

    /// Attributes changed since the last save, with their values.
    pub(crate) fn changed_values(&self) -> Vec<(&'static str, &Value)> {
        self.changed
            .iter()
            .filter_map(|name| self.attributes.get(name).map(|v| (*name, v)))
            .collect()
    }

    pub(crate) fn mark_persisted(&mut self, profile: ObjectProfile) {
        self.state = EntityState::Persisted;
        self.profile = Some(profile);
        self.changed.clear();
        self.relationships_changed = false;
        for datastream in self.datastreams.values_mut() {
            if datastream.is_changed() {
                datastream.mark_saved();
            }
        }
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.state = EntityState::Destroyed;
        self.associations.clear();
        self.frozen = true;
    }

    /// Copy `fetched` attributes except those changed locally.
    pub(crate) fn merge_fetched(&mut self, fetched: &Self) {
        for (name, value) in &fetched.attributes {
            if !self.changed.contains(name) {
                self.attributes.insert(*name, value.clone());
            }
        }
        self.profile.clone_from(&fetched.profile);
        if !fetched.is_partial() && self.is_partial() {
            self.datastreams.clone_from(&fetched.datastreams);
            self.relationships.clone_from(&fetched.relationships);
            self.hydration = Hydration::Full;
        }
    }

    /// Drop association state and reload everything from `record`.
    pub(crate) fn reload_from(&mut self, record: &ObjectRecord, translator: &dyn UriTranslator) {
        self.associations.clear();
        self.load_record(record, translator);
    }

    /// Fill a partial entity from storage, keeping locally changed attributes.
    pub(crate) fn hydrate_from(&mut self, record: &ObjectRecord, translator: &dyn UriTranslator) {
        let mut fetched = Self::new(self.model);
        fetched.load_record(record, translator);
        self.hydration = Hydration::Partial;
        self.merge_fetched(&fetched);
    }
}

impl PartialEq for Entity {
    // Identity is the identifier; unsaved entities are never equal.
    fn eq(&self, other: &Self) -> bool {
        match (&self.pid, &other.pid) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

fn declared_datastreams(model: &'static EntityModel) -> BTreeMap<String, Datastream> {
    model
        .all_datastreams()
        .into_iter()
        .map(|declared| (declared.dsid.to_string(), Datastream::declared(declared)))
        .collect()
}

fn default_attributes(model: &'static EntityModel) -> BTreeMap<&'static str, Value> {
    model
        .attributes()
        .into_iter()
        .map(|attribute| {
            let value = if attribute.is_multiple() {
                Value::List(Vec::new())
            } else {
                Value::Null
            };
            (attribute.name(), value)
        })
        .collect()
}

// Validate and normalize a value against its declaration.
fn conform(
    model: &'static EntityModel,
    attribute: AttributeDef,
    value: Value,
) -> Result<Value, InternalError> {
    let shape_error = |expected: &'static str| -> InternalError {
        MappingError::AttributeShape {
            model: model.name,
            name: attribute.name(),
            expected,
        }
        .into()
    };

    let (expected, check): (&'static str, fn(&Value) -> bool) = match attribute {
        AttributeDef::ForeignKey(_) => ("identifiers", |v| matches!(v, Value::Text(_))),
        AttributeDef::Property(property) => match property.kind {
            PropertyKind::Text => ("text", |v| matches!(v, Value::Text(_))),
            PropertyKind::Integer => ("integers", |v| matches!(v, Value::Int(_))),
            PropertyKind::Boolean => ("booleans", |v| matches!(v, Value::Bool(_))),
        },
    };

    if attribute.is_multiple() {
        match value {
            Value::Null => Ok(Value::List(Vec::new())),
            Value::List(items) if items.iter().all(check) => Ok(Value::List(items)),
            Value::List(_) => Err(shape_error(expected)),
            _ => Err(shape_error("a list")),
        }
    } else {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Text(ref text) if text.is_empty() && attribute.is_foreign_key() => {
                Ok(Value::Null)
            }
            Value::List(_) => Err(shape_error("a single value")),
            other if check(&other) => Ok(other),
            _ => Err(shape_error(expected)),
        }
    }
}

// Read declared attributes back from relationship statements.
fn attributes_from_graph(
    model: &'static EntityModel,
    graph: &Graph,
    subject: &str,
    translator: &dyn UriTranslator,
) -> BTreeMap<&'static str, Value> {
    let mut attributes = default_attributes(model);

    for attribute in model.attributes() {
        let items: Vec<Value> = graph
            .objects(subject, attribute.predicate())
            .filter_map(|term| match (attribute, term) {
                (AttributeDef::ForeignKey(_), Term::Uri(uri)) => translator
                    .uri_to_id(uri)
                    .map(|pid| Value::Text(pid.into_string())),
                (AttributeDef::Property(_), Term::Literal(literal)) => Some(match literal {
                    Literal::String(text) => Value::Text(text.clone()),
                    Literal::Integer(int) => Value::Int(*int),
                    Literal::Boolean(flag) => Value::Bool(*flag),
                }),
                _ => None,
            })
            .collect();

        let value = if attribute.is_multiple() {
            Value::List(items)
        } else {
            items.into_iter().next().unwrap_or_default()
        };
        attributes.insert(attribute.name(), value);
    }

    attributes
}
