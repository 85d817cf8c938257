//! ## Crate layout
//! - `core`: entity models, storage and search boundaries, association
//!   resolution, persistence, config, and observability.
//!
//! The `prelude` module mirrors the surface application code needs to
//! declare models and work with entities.

pub use repodb_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//
// Re-exports
//

pub use crate::core::{
    config::Config,
    db::{
        Db,
        persistence::{DeleteOutcome, RelationshipFailure},
        search::{MemorySearch, SearchClient},
        store::{MemoryStorage, StorageClient},
    },
    error::{ErrorClass, ErrorOrigin, InternalError as Error},
};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        db::{
            Db,
            association::{CacheState, CollectionProxy, SingularProxy},
            entity::{Entity, EntityState},
        },
        model::{
            AssociationKind, DatastreamModel, DependentPolicy, EntityModel, PropertyKind,
            PropertyModel, ReflectionModel,
        },
        types::{Field, Pid},
        value::Value,
    };
    pub use serde::{Deserialize, Serialize};
}
