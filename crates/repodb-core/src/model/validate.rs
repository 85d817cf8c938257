use crate::model::{
    entity::EntityModel,
    reflection::{AssociationKind, ReflectionModel},
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// MappingError
///
/// Malformed model declarations and unknown names. Raised when a class is
/// registered or on first use, and never retried.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum MappingError {
    #[error("model '{model}' is already registered")]
    DuplicateModel { model: &'static str },

    #[error(
        "model '{model}' asserts predicate '{predicate}' from both '{first}' and '{second}'"
    )]
    DuplicatePredicate {
        model: &'static str,
        predicate: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("model '{model}' declares attribute '{name}' twice")]
    DuplicateAttribute {
        model: &'static str,
        name: &'static str,
    },

    #[error("reflection '{reflection}' has no foreign key")]
    MissingForeignKey { reflection: &'static str },

    #[error("has_many reflection '{reflection}' must not declare a foreign key")]
    UnexpectedForeignKey { reflection: &'static str },

    #[error("reflection '{reflection}' has a zero page size")]
    ZeroPageSize { reflection: &'static str },

    #[error(
        "reflection '{reflection}' uses predicate '{predicate}' but '{target}' holds no foreign key for it"
    )]
    UnregisteredPredicate {
        reflection: &'static str,
        predicate: &'static str,
        target: &'static str,
    },

    #[error("reflection '{reflection}' names inverse '{inverse}' which '{target}' does not declare")]
    UnknownInverse {
        reflection: &'static str,
        inverse: &'static str,
        target: &'static str,
    },

    #[error("model '{model}' has no reflection named '{name}'")]
    UnknownReflection { model: &'static str, name: String },

    #[error("reflection '{name}' on '{model}' is {found}, not {expected}")]
    WrongAssociationKind {
        model: &'static str,
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("model '{model}' has no attribute named '{name}'")]
    UnknownAttribute { model: &'static str, name: String },

    #[error("attribute '{name}' on '{model}' expects {expected}")]
    AttributeShape {
        model: &'static str,
        name: &'static str,
        expected: &'static str,
    },

    #[error("model '{model}' has no datastream named '{dsid}'")]
    UnknownDatastream { model: &'static str, dsid: String },
}

/// Validate one model's declarations, including inherited ones.
pub fn validate_model(model: &'static EntityModel) -> Result<(), MappingError> {
    let reflections = model.all_reflections();

    // predicates stored on this object's own subject must be unambiguous
    let mut owners: BTreeMap<&'static str, &'static ReflectionModel> = BTreeMap::new();
    for reflection in &reflections {
        validate_reflection(reflection)?;

        if reflection.kind == AssociationKind::HasMany {
            continue;
        }
        if let Some(first) = owners.insert(reflection.predicate, reflection) {
            return Err(MappingError::DuplicatePredicate {
                model: model.name,
                predicate: reflection.predicate,
                first: first.name,
                second: reflection.name,
            });
        }
    }

    let mut names: BTreeMap<&'static str, ()> = BTreeMap::new();
    for attribute in model.attributes() {
        if names.insert(attribute.name(), ()).is_some() {
            return Err(MappingError::DuplicateAttribute {
                model: model.name,
                name: attribute.name(),
            });
        }
    }

    for property in model.all_properties() {
        if let Some(reflection) = owners.get(property.predicate) {
            return Err(MappingError::DuplicatePredicate {
                model: model.name,
                predicate: property.predicate,
                first: reflection.name,
                second: property.name,
            });
        }
    }

    Ok(())
}

fn validate_reflection(reflection: &'static ReflectionModel) -> Result<(), MappingError> {
    if reflection.page_size == Some(0) {
        return Err(MappingError::ZeroPageSize {
            reflection: reflection.name,
        });
    }

    match reflection.kind {
        AssociationKind::BelongsTo | AssociationKind::HasAndBelongsToMany => {
            reflection.owner_foreign_key()?;
            reflection.inverse()?;
        }
        AssociationKind::HasMany => {
            if reflection.foreign_key.is_some() {
                return Err(MappingError::UnexpectedForeignKey {
                    reflection: reflection.name,
                });
            }
            reflection.member_foreign_key()?;
        }
    }

    Ok(())
}

///
/// TESTS
///
