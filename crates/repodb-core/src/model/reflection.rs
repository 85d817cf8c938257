use crate::model::{entity::EntityModel, validate::MappingError};

///
/// ReflectionModel
///
/// Static description of one association.
///
/// - `belongs_to` and `has_and_belongs_to_many` store their foreign key on
///   the owner (a single id, or an id array) as statements under `predicate`.
/// - `has_many` stores nothing on the owner; membership is the inverse
///   reflection's foreign key on each member, found by `inverse_of` or by a
///   shared predicate.
///

#[derive(Debug)]
pub struct ReflectionModel {
    pub name: &'static str,
    pub kind: AssociationKind,
    pub target: &'static EntityModel,
    pub predicate: &'static str,
    pub foreign_key: Option<&'static str>,
    pub inverse_of: Option<&'static str>,
    /// Batch size for id-list lookups (`has_and_belongs_to_many`).
    pub page_size: Option<usize>,
    /// What owner deletion does to members (`has_many`).
    pub dependent: DependentPolicy,
}

impl ReflectionModel {
    #[must_use]
    pub const fn belongs_to(
        name: &'static str,
        target: &'static EntityModel,
        predicate: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self::new(
            name,
            AssociationKind::BelongsTo,
            target,
            predicate,
            Some(foreign_key),
        )
    }

    #[must_use]
    pub const fn has_many(
        name: &'static str,
        target: &'static EntityModel,
        predicate: &'static str,
    ) -> Self {
        Self::new(name, AssociationKind::HasMany, target, predicate, None)
    }

    #[must_use]
    pub const fn has_and_belongs_to_many(
        name: &'static str,
        target: &'static EntityModel,
        predicate: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self::new(
            name,
            AssociationKind::HasAndBelongsToMany,
            target,
            predicate,
            Some(foreign_key),
        )
    }

    const fn new(
        name: &'static str,
        kind: AssociationKind,
        target: &'static EntityModel,
        predicate: &'static str,
        foreign_key: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            kind,
            target,
            predicate,
            foreign_key,
            inverse_of: None,
            page_size: None,
            dependent: DependentPolicy::Nullify,
        }
    }

    #[must_use]
    pub const fn inverse_of(mut self, name: &'static str) -> Self {
        self.inverse_of = Some(name);
        self
    }

    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub const fn dependent(mut self, policy: DependentPolicy) -> Self {
        self.dependent = policy;
        self
    }

    /// Foreign key attribute on the owner; errors for `has_many`.
    pub fn owner_foreign_key(&self) -> Result<&'static str, MappingError> {
        self.foreign_key.ok_or(MappingError::MissingForeignKey {
            reflection: self.name,
        })
    }

    /// Reflection on the target that holds the foreign key back to the owner.
    ///
    /// For `has_many` this must exist; for `has_and_belongs_to_many` it exists
    /// only when the association is two-way.
    pub fn inverse(&self) -> Result<Option<&'static ReflectionModel>, MappingError> {
        let target = self.target;
        if let Some(name) = self.inverse_of {
            return target
                .reflection(name)
                .map(Some)
                .ok_or(MappingError::UnknownInverse {
                    reflection: self.name,
                    inverse: name,
                    target: target.name,
                });
        }

        match self.kind {
            AssociationKind::HasMany => target
                .all_reflections()
                .into_iter()
                .find(|r| r.predicate == self.predicate && r.foreign_key.is_some())
                .map(Some)
                .ok_or(MappingError::UnregisteredPredicate {
                    reflection: self.name,
                    predicate: self.predicate,
                    target: target.name,
                }),
            AssociationKind::BelongsTo | AssociationKind::HasAndBelongsToMany => Ok(None),
        }
    }

    /// Inverse foreign key for `has_many`.
    pub fn member_foreign_key(&self) -> Result<&'static ReflectionModel, MappingError> {
        let inverse = self.inverse()?.ok_or(MappingError::UnregisteredPredicate {
            reflection: self.name,
            predicate: self.predicate,
            target: self.target.name,
        })?;
        if inverse.foreign_key.is_none() {
            return Err(MappingError::MissingForeignKey {
                reflection: inverse.name,
            });
        }

        Ok(inverse)
    }

    /// Ids per has_and_belongs_to_many lookup; `default` applies when the
    /// reflection declares no page size of its own.
    pub const fn batch_size(&self, default: usize) -> Result<usize, MappingError> {
        match self.page_size {
            Some(0) => Err(MappingError::ZeroPageSize {
                reflection: self.name,
            }),
            Some(size) => Ok(size),
            None if default == 0 => Err(MappingError::ZeroPageSize {
                reflection: self.name,
            }),
            None => Ok(default),
        }
    }
}

///
/// AssociationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
    HasAndBelongsToMany,
}

impl AssociationKind {
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::HasAndBelongsToMany)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::HasMany => "has_many",
            Self::HasAndBelongsToMany => "has_and_belongs_to_many",
        }
    }
}

///
/// DependentPolicy
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DependentPolicy {
    /// Clear the member's foreign key; the member stays persisted.
    #[default]
    Nullify,
    /// Delete the member.
    Destroy,
}
