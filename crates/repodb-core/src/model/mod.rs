//! Runtime data model definitions.
//!
//! Models are static tables: an [`EntityModel`] per entity class, listing its
//! datastreams, properties, and association reflections. Nothing here holds
//! runtime state; the association resolver and persistence coordinator read
//! these tables to decide what to query and what to write.
//!
//! Models must be declared as `static` items so references stay stable.

pub mod entity;
pub mod reflection;
mod validate;

pub use entity::{
    AttributeDef, BASE, CMODEL_PREFIX, DatastreamKind, DatastreamModel, EntityModel,
    HAS_MODEL_PREDICATE, PropertyKind, PropertyModel, RELS_EXT,
};
pub use reflection::{AssociationKind, DependentPolicy, ReflectionModel};
pub use validate::{MappingError, validate_model};
