//! Core runtime for repodb: entity models, the storage and search boundaries,
//! association resolution, persistence, and the ergonomics exported via the
//! `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod rdf;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No backends, errors, or query builders are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            Db,
            association::CacheState,
            entity::{Entity, EntityState},
        },
        model::{
            AssociationKind, DatastreamModel, DependentPolicy, EntityModel, PropertyKind,
            PropertyModel, ReflectionModel,
        },
        types::{Field, Pid},
        value::Value,
    };
}
