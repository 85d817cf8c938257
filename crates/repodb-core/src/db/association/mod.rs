//! Module: db::association
//! Responsibility: resolving and mutating associations (belongs_to, has_many,
//! has_and_belongs_to_many) through per-entity caches.
//! Does not own: reflection declarations (see `model::reflection`) or object
//! writes beyond the foreign keys it maintains.
//!
//! Invariants:
//! - Type-mismatch checks run before any mutation.
//! - A failed load leaves the cache entry in its previous state.
//! - Index hits whose objects storage no longer holds are dropped, never
//!   surfaced as errors.

mod cache;
mod collection;
mod habtm;
mod has_many;
mod reify;
mod singular;

#[cfg(test)]
mod tests;

pub use cache::{AssociationCache, AssociationEntry, CacheState};
pub use collection::CollectionProxy;
pub use singular::SingularProxy;

use crate::{
    db::{
        Db,
        entity::Entity,
        search::{SearchClient, query::has_model_query},
        store::StorageClient,
    },
    error::InternalError,
    model::{AssociationKind, EntityModel, MappingError, ReflectionModel},
    types::Pid,
    value::Value,
};

impl<S: StorageClient, I: SearchClient> Db<S, I> {
    /// Collection proxy for a has_many or has_and_belongs_to_many reflection.
    pub fn collection<'a>(
        &'a self,
        owner: &'a mut Entity,
        name: &str,
    ) -> Result<CollectionProxy<'a, S, I>, InternalError> {
        let reflection = reflection_for(owner.model(), name)?;
        if !reflection.kind.is_collection() {
            return Err(wrong_kind(owner.model(), reflection, "a collection").into());
        }

        Ok(CollectionProxy::new(self, owner, reflection))
    }

    /// Singular proxy for a belongs_to reflection.
    pub fn singular<'a>(
        &'a self,
        owner: &'a mut Entity,
        name: &str,
    ) -> Result<SingularProxy<'a, S, I>, InternalError> {
        let reflection = reflection_for(owner.model(), name)?;
        if reflection.kind != AssociationKind::BelongsTo {
            return Err(wrong_kind(
                owner.model(),
                reflection,
                AssociationKind::BelongsTo.as_str(),
            )
            .into());
        }
        let foreign_key = reflection.owner_foreign_key()?;

        Ok(SingularProxy::new(self, owner, reflection, foreign_key))
    }

    /// Type clause over `target` and its registered subclasses; empty for the
    /// base class, which matches everything.
    pub(crate) fn type_clause(&self, target: &'static EntityModel) -> String {
        if target.is_base() {
            return String::new();
        }
        let uris: Vec<String> = self
            .registry()
            .candidates(target)
            .into_iter()
            .map(EntityModel::class_uri)
            .collect();

        has_model_query(&uris)
    }
}

fn reflection_for(
    model: &'static EntityModel,
    name: &str,
) -> Result<&'static ReflectionModel, InternalError> {
    model.reflection(name).ok_or_else(|| {
        MappingError::UnknownReflection {
            model: model.name,
            name: name.to_string(),
        }
        .into()
    })
}

fn wrong_kind(
    model: &'static EntityModel,
    reflection: &'static ReflectionModel,
    expected: &'static str,
) -> MappingError {
    MappingError::WrongAssociationKind {
        model: model.name,
        name: reflection.name,
        expected,
        found: reflection.kind.as_str(),
    }
}

/// Reject candidates that are neither the target class nor a subclass.
pub(crate) fn ensure_target_type(
    reflection: &'static ReflectionModel,
    candidate: &Entity,
) -> Result<(), InternalError> {
    if candidate.model().is_kind_of(reflection.target) {
        return Ok(());
    }

    Err(InternalError::association_type_mismatch(
        reflection.name,
        reflection.target.name,
        candidate.model().name,
    ))
}

/// Identifier array as an attribute value.
pub(crate) fn id_list(ids: &[Pid]) -> Value {
    Value::List(ids.iter().map(Value::from).collect())
}
