use crate::model::reflection::{AssociationKind, ReflectionModel};
use std::fmt;

///
/// CONSTANTS
///

/// Predicate used for the type assertion written on every object.
pub const HAS_MODEL_PREDICATE: &str = "info:fedora/fedora-system:def/model#hasModel";

/// Prefix of every class URI (`info:fedora/afmodel:Book`).
pub const CMODEL_PREFIX: &str = "info:fedora/afmodel:";

/// Relationship datastream holding attributes and relationship statements.
pub const RELS_EXT: &str = "RELS-EXT";

/// Universal base class. Every model descends from it implicitly.
pub static BASE: EntityModel = EntityModel {
    path: "repodb::Base",
    name: "ActiveFedora_Base",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[],
    reflections: &[],
};

///
/// EntityModel
/// Static model for one entity class.
///

pub struct EntityModel {
    /// Fully-qualified path, used for identity and diagnostics.
    pub path: &'static str,
    /// Class name used in the class URI.
    pub name: &'static str,
    /// Identifier namespace used when minting; falls back to config.
    pub namespace: Option<&'static str>,
    /// Superclass; `None` means a direct child of [`BASE`].
    pub parent: Option<&'static Self>,
    pub datastreams: &'static [DatastreamModel],
    pub properties: &'static [PropertyModel],
    pub reflections: &'static [ReflectionModel],
}

impl EntityModel {
    #[must_use]
    pub fn class_uri(&self) -> String {
        format!("{CMODEL_PREFIX}{}", self.name)
    }

    #[must_use]
    pub fn is_base(&self) -> bool {
        self.path == BASE.path
    }

    /// Self first, then each ancestor up to (excluding) [`BASE`].
    #[must_use]
    pub fn lineage(&'static self) -> Vec<&'static Self> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(model) = current {
            if model.is_base() {
                break;
            }
            out.push(model);
            current = model.parent;
        }

        out
    }

    /// True when `self` is `other` or one of its subclasses.
    #[must_use]
    pub fn is_kind_of(&'static self, other: &Self) -> bool {
        other.is_base() || self.lineage().iter().any(|m| *m == other)
    }

    /// Number of ancestors between this class and [`BASE`].
    #[must_use]
    pub fn depth(&'static self) -> usize {
        self.lineage().len()
    }

    /// Reflections declared here or inherited; nearer declarations shadow by name.
    #[must_use]
    pub fn all_reflections(&'static self) -> Vec<&'static ReflectionModel> {
        let mut out: Vec<&'static ReflectionModel> = Vec::new();
        for model in self.lineage() {
            for reflection in model.reflections {
                if !out.iter().any(|r| r.name == reflection.name) {
                    out.push(reflection);
                }
            }
        }

        out
    }

    #[must_use]
    pub fn all_properties(&'static self) -> Vec<&'static PropertyModel> {
        let mut out: Vec<&'static PropertyModel> = Vec::new();
        for model in self.lineage() {
            for property in model.properties {
                if !out.iter().any(|p| p.name == property.name) {
                    out.push(property);
                }
            }
        }

        out
    }

    #[must_use]
    pub fn all_datastreams(&'static self) -> Vec<&'static DatastreamModel> {
        let mut out: Vec<&'static DatastreamModel> = Vec::new();
        for model in self.lineage() {
            for ds in model.datastreams {
                if !out.iter().any(|d| d.dsid == ds.dsid) {
                    out.push(ds);
                }
            }
        }

        out
    }

    #[must_use]
    pub fn reflection(&'static self, name: &str) -> Option<&'static ReflectionModel> {
        self.all_reflections().into_iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn property(&'static self, name: &str) -> Option<&'static PropertyModel> {
        self.all_properties().into_iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn datastream(&'static self, dsid: &str) -> Option<&'static DatastreamModel> {
        self.all_datastreams().into_iter().find(|d| d.dsid == dsid)
    }

    /// Resolve a settable attribute name.
    #[must_use]
    pub fn attribute(&'static self, name: &str) -> Option<AttributeDef> {
        if let Some(property) = self.property(name) {
            return Some(AttributeDef::Property(property));
        }

        self.all_reflections()
            .into_iter()
            .find(|r| r.foreign_key == Some(name))
            .map(AttributeDef::ForeignKey)
    }

    /// Every settable attribute, properties first.
    #[must_use]
    pub fn attributes(&'static self) -> Vec<AttributeDef> {
        let mut out: Vec<AttributeDef> = self
            .all_properties()
            .into_iter()
            .map(AttributeDef::Property)
            .collect();
        out.extend(
            self.all_reflections()
                .into_iter()
                .filter(|r| r.foreign_key.is_some())
                .map(AttributeDef::ForeignKey),
        );

        out
    }

    /// Reflections of a given kind, in declaration order.
    #[must_use]
    pub fn reflections_of(&'static self, kind: AssociationKind) -> Vec<&'static ReflectionModel> {
        self.all_reflections()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

impl PartialEq for EntityModel {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for EntityModel {}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

///
/// AttributeDef
/// A settable attribute: a declared property or a foreign key.
///

#[derive(Clone, Copy, Debug)]
pub enum AttributeDef {
    Property(&'static PropertyModel),
    ForeignKey(&'static ReflectionModel),
}

impl AttributeDef {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Property(p) => p.name,
            Self::ForeignKey(r) => match r.foreign_key {
                Some(fk) => fk,
                None => r.name,
            },
        }
    }

    #[must_use]
    pub const fn predicate(&self) -> &'static str {
        match self {
            Self::Property(p) => p.predicate,
            Self::ForeignKey(r) => r.predicate,
        }
    }

    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        match self {
            Self::Property(p) => p.multiple,
            Self::ForeignKey(r) => r.kind.is_collection(),
        }
    }

    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey(_))
    }
}

///
/// PropertyModel
/// A plain attribute persisted as RDF statements on the object.
///

#[derive(Debug)]
pub struct PropertyModel {
    pub name: &'static str,
    pub predicate: &'static str,
    pub kind: PropertyKind,
    pub multiple: bool,
}

impl PropertyModel {
    #[must_use]
    pub const fn new(name: &'static str, predicate: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            predicate,
            kind,
            multiple: false,
        }
    }

    #[must_use]
    pub const fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

///
/// PropertyKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyKind {
    Text,
    Integer,
    Boolean,
}

///
/// DatastreamModel
/// A datastream the class declares; created empty on every new entity.
///

#[derive(Debug)]
pub struct DatastreamModel {
    pub dsid: &'static str,
    pub kind: DatastreamKind,
    pub label: &'static str,
    pub mime_type: &'static str,
}

impl DatastreamModel {
    #[must_use]
    pub const fn metadata(dsid: &'static str, label: &'static str) -> Self {
        Self {
            dsid,
            kind: DatastreamKind::Metadata,
            label,
            mime_type: "application/n-triples",
        }
    }

    #[must_use]
    pub const fn file(dsid: &'static str, label: &'static str, mime_type: &'static str) -> Self {
        Self {
            dsid,
            kind: DatastreamKind::File,
            label,
            mime_type,
        }
    }
}

///
/// DatastreamKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatastreamKind {
    Metadata,
    File,
}
