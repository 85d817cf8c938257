//! Module: db::persistence
//! Responsibility: create, update, delete, reload, and indexing of entities,
//! including the foreign-key bookkeeping associations need around a save.
//! Does not own: association resolution (see `db::association`).
//!
//! Invariants:
//! - Storage is written before the index; an index failure after a storage
//!   write is surfaced, and the object is persisted but unindexed.
//! - Deleting an object that storage doesn't hold fails with NotFound.
//! - Dirty tracking is cleared only after storage accepted the write.

mod find;

#[cfg(test)]
mod tests;

use crate::{
    db::{
        Db,
        association::id_list,
        entity::{ChangeSet, Entity},
        search::{AddOptions, SearchClient},
        store::{DatastreamPayload, DatastreamWrite, ObjectProfile, SaveRequest, StorageClient},
    },
    error::InternalError,
    model::{
        AssociationKind, DependentPolicy, EntityModel, HAS_MODEL_PREDICATE, RELS_EXT,
        ReflectionModel,
    },
    obs::MetricsEvent,
    rdf::{Term, Triple},
    types::Pid,
    value::Value,
};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, warn};

///
/// DeleteOutcome
///
/// Result of a delete that reached storage. Relationship removals that
/// failed along the way are listed rather than aborting the delete, unless
/// `delete.halt_on_relationship_failure` is set.
///

#[derive(Debug)]
pub struct DeleteOutcome {
    pub pid: Pid,
    pub relationship_failures: Vec<RelationshipFailure>,
}

impl DeleteOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.relationship_failures.is_empty()
    }
}

///
/// RelationshipFailure
///

#[derive(Debug)]
pub struct RelationshipFailure {
    pub reflection: &'static str,
    pub member: Option<Pid>,
    pub error: InternalError,
}

impl<S: StorageClient, I: SearchClient> Db<S, I> {
    /// New entity of `model` with `attributes`, saved.
    pub fn create<K, V>(
        &self,
        model: &'static EntityModel,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Entity, InternalError>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Entity::new(model);
        entity.assign(attributes)?;
        self.save(&mut entity)?;

        Ok(entity)
    }

    /// Merge `attributes` into `entity` and save it.
    pub fn update<K, V>(
        &self,
        entity: &mut Entity,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), InternalError>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        entity.assign(attributes)?;

        self.save(entity)
    }

    /// Create or update depending on the entity's lifecycle state.
    pub fn save(&self, entity: &mut Entity) -> Result<(), InternalError> {
        if entity.is_destroyed() {
            return Err(InternalError::entity_destroyed(&entity.describe()));
        }
        if entity.is_frozen() {
            return Err(InternalError::entity_frozen(&entity.describe()));
        }

        if entity.is_new() {
            self.insert_object(entity)
        } else {
            self.update_object(entity)
        }
    }

    /// Delete from storage and the index after severing relationships.
    pub fn delete(&self, entity: &mut Entity) -> Result<DeleteOutcome, InternalError> {
        let Some(pid) = entity.pid().filter(|_| entity.is_persisted()).cloned() else {
            return Err(InternalError::never_persisted("delete", &entity.describe()));
        };
        let model = entity.model();
        let mut failures = Vec::new();

        for reflection in model.reflections_of(AssociationKind::HasMany) {
            self.sever_has_many(entity, reflection, &mut failures)?;
        }
        for reflection in model.reflections_of(AssociationKind::HasAndBelongsToMany) {
            self.sever_habtm(entity, reflection, &mut failures)?;
        }

        debug!(%pid, "storage delete");
        self.storage().delete(&pid)?;

        self.search().delete_by_id(pid.as_str())?;
        self.record(MetricsEvent::IndexDelete);
        if self.commit_immediately() {
            self.search().commit()?;
        }

        entity.mark_destroyed();
        self.record(MetricsEvent::Delete {
            entity_path: model.path,
        });

        Ok(DeleteOutcome {
            pid,
            relationship_failures: failures,
        })
    }

    /// Discard association state and local changes, and re-read from storage.
    pub fn reload(&self, entity: &mut Entity) -> Result<(), InternalError> {
        let Some(pid) = entity.pid().filter(|_| entity.is_persisted()).cloned() else {
            return Err(InternalError::never_persisted("reload", &entity.describe()));
        };
        let record = self.fetch_record(&pid)?;
        entity.reload_from(&record, self.translator());

        Ok(())
    }

    /// Load datastreams for an entity reified from an index profile.
    pub fn hydrate(&self, entity: &mut Entity) -> Result<(), InternalError> {
        if !entity.is_partial() {
            return Ok(());
        }
        let Some(pid) = entity.pid().cloned() else {
            return Err(InternalError::never_persisted("hydrate", &entity.describe()));
        };
        debug!(%pid, "hydrating partial entity");
        let record = self.fetch_record(&pid)?;
        entity.hydrate_from(&record, self.translator());

        Ok(())
    }

    /// Write the entity's index document.
    pub fn update_index(&self, entity: &Entity) -> Result<(), InternalError> {
        let document = entity.to_solr(self.translator())?;
        self.search().add(
            document,
            AddOptions {
                commit: self.commit_immediately(),
            },
        )?;
        self.record(MetricsEvent::IndexWrite);

        Ok(())
    }

    /// Make pending index writes visible; needed under the deferred policy.
    pub fn commit_index(&self) -> Result<(), InternalError> {
        Ok(self.search().commit()?)
    }

    ///
    /// CREATE / UPDATE
    ///

    fn insert_object(&self, entity: &mut Entity) -> Result<(), InternalError> {
        let model = entity.model();

        // an identifier minted by an earlier failed attempt is kept
        let pid = match entity.pid() {
            Some(pid) => pid.clone(),
            None => {
                let namespace = self.namespace_for(entity);
                let pid = self.storage().mint_identifier(&namespace)?;
                debug!(%pid, model = model.name, "minted identifier");
                entity.assign_pid(pid.clone());
                pid
            }
        };
        let uri = self.uri_for(&pid);

        entity.relationships_mut().insert(Triple::new(
            uri.as_str(),
            HAS_MODEL_PREDICATE,
            Term::uri(model.class_uri()),
        ));
        entity.resolve_self_subject(&uri);
        self.save_pending_habtm(entity)?;

        let profile = ObjectProfile::new(OffsetDateTime::now_utc());
        let request = self.save_request(entity, &uri, profile.clone());
        self.storage().save(&pid, &request)?;
        entity.mark_persisted(profile);
        debug!(%pid, datastreams = request.datastreams.len(), "created object");

        self.flush_members(entity)?;
        self.record(MetricsEvent::Create {
            entity_path: model.path,
        });

        if self.config().indexing.on_create {
            self.update_index(entity)?;
        }

        Ok(())
    }

    fn update_object(&self, entity: &mut Entity) -> Result<(), InternalError> {
        if entity.is_partial() {
            self.hydrate(entity)?;
        }
        let Some(pid) = entity.pid().cloned() else {
            return Err(InternalError::persistence_invariant(format!(
                "persisted {} has no identifier",
                entity.describe()
            )));
        };
        self.save_pending_habtm(entity)?;

        if entity.is_changed() {
            let uri = self.uri_for(&pid);
            let changed: Vec<&'static str> = entity.changed_attributes().collect();

            let now = OffsetDateTime::now_utc();
            let mut profile = entity
                .profile()
                .cloned()
                .unwrap_or_else(|| ObjectProfile::new(now));
            profile.modified = now;

            let request = self.save_request(entity, &uri, profile.clone());
            self.storage().save(&pid, &request)?;
            entity.mark_persisted(profile);
            refresh_caches(entity, &changed);
            debug!(%pid, datastreams = request.datastreams.len(), "updated object");

            self.record(MetricsEvent::Update {
                entity_path: entity.model().path,
            });
            if self.config().indexing.on_update {
                self.update_index(entity)?;
            }
        } else {
            debug!(%pid, "nothing changed; skipping storage write");
        }

        self.flush_members(entity)
    }

    fn namespace_for(&self, entity: &Entity) -> String {
        entity
            .namespace()
            .or(entity.model().namespace)
            .unwrap_or(self.config().namespace.as_str())
            .to_string()
    }

    // Apply attribute changes to RELS-EXT and collect every changed datastream.
    fn save_request(
        &self,
        entity: &mut Entity,
        uri: &str,
        profile: ObjectProfile,
    ) -> SaveRequest {
        let change_set =
            ChangeSet::build(entity.model(), entity.changed_values(), self.translator());
        if !change_set.is_empty() {
            change_set.apply(entity.relationships_mut(), uri);
        }

        let mut datastreams = BTreeMap::new();
        if entity.relationships_changed() {
            datastreams.insert(
                RELS_EXT.to_string(),
                DatastreamWrite {
                    label: "Fedora Object-to-Object Relationship Metadata".to_string(),
                    mime_type: "application/n-triples".to_string(),
                    content: DatastreamPayload::Graph(entity.relationships().clone()),
                },
            );
        }
        for datastream in entity.changed_datastreams() {
            if datastream.content().is_empty() {
                warn!(
                    dsid = datastream.dsid(),
                    entity = %entity.describe(),
                    "skipping empty datastream"
                );
                continue;
            }
            datastreams.insert(datastream.dsid().to_string(), datastream.to_write());
        }

        SaveRequest {
            profile,
            datastreams,
        }
    }

    ///
    /// ASSOCIATION BOOKKEEPING
    ///

    // Built (unsaved) habtm members are saved first so their identifiers can
    // go into the owner's foreign key array.
    fn save_pending_habtm(&self, entity: &mut Entity) -> Result<(), InternalError> {
        for reflection in entity
            .model()
            .reflections_of(AssociationKind::HasAndBelongsToMany)
        {
            let pending = entity
                .associations()
                .get(reflection.name)
                .is_some_and(|entry| entry.members().iter().any(Entity::is_new));
            if !pending {
                continue;
            }

            for_each_member(entity, reflection.name, |member| {
                if member.is_new() {
                    self.save(member)?;
                }
                Ok(())
            })?;

            let foreign_key = reflection.owner_foreign_key()?;
            let mut ids = entity.foreign_key_ids(foreign_key);
            let member_ids: Vec<Pid> = entity
                .associations()
                .get(reflection.name)
                .map(|entry| {
                    entry
                        .members()
                        .iter()
                        .filter_map(Entity::pid)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for pid in member_ids {
                if !ids.contains(&pid) {
                    ids.push(pid);
                }
            }
            entity.write_raw(foreign_key, id_list(&ids))?;
        }

        Ok(())
    }

    // After the owner is saved: point pending has_many members at it, and
    // mirror it into inverse habtm arrays.
    fn flush_members(&self, entity: &mut Entity) -> Result<(), InternalError> {
        let Some(owner_pid) = entity.pid().cloned() else {
            return Ok(());
        };

        for reflection in entity.model().all_reflections() {
            match reflection.kind {
                AssociationKind::HasMany => {
                    let foreign_key = reflection.member_foreign_key()?.owner_foreign_key()?;
                    for_each_member(entity, reflection.name, |member| {
                        if member.is_new()
                            || member.foreign_key_id(foreign_key).as_ref() != Some(&owner_pid)
                        {
                            member.set(foreign_key, &owner_pid)?;
                            self.save(member)?;
                        }
                        Ok(())
                    })?;
                }
                AssociationKind::HasAndBelongsToMany => {
                    let Some(inverse) = reflection.inverse()? else {
                        continue;
                    };
                    let inverse_key = inverse.owner_foreign_key()?;
                    for_each_member(entity, reflection.name, |member| {
                        let mut ids = member.foreign_key_ids(inverse_key);
                        if member.is_persisted() && !ids.contains(&owner_pid) {
                            ids.push(owner_pid.clone());
                            member.set(inverse_key, id_list(&ids))?;
                            self.save(member)?;
                        }
                        Ok(())
                    })?;
                }
                AssociationKind::BelongsTo => {}
            }
        }

        Ok(())
    }

    fn sever_has_many(
        &self,
        entity: &mut Entity,
        reflection: &'static ReflectionModel,
        failures: &mut Vec<RelationshipFailure>,
    ) -> Result<(), InternalError> {
        let halt = self.config().delete.halt_on_relationship_failure;
        let foreign_key = reflection.member_foreign_key()?.owner_foreign_key()?;
        let owner_pid = entity.pid().cloned();

        if let Err(error) = self.collection(entity, reflection.name)?.load_target() {
            return record_failure(failures, reflection.name, None, error, halt);
        }

        let members = entity.associations_mut().entry(reflection.name).take_members();
        for mut member in members {
            let result = match reflection.dependent {
                DependentPolicy::Destroy => self.delete(&mut member).map(|outcome| {
                    failures.extend(outcome.relationship_failures);
                }),
                DependentPolicy::Nullify => {
                    if member.is_persisted() && member.foreign_key_id(foreign_key) == owner_pid {
                        member
                            .set(foreign_key, Value::Null)
                            .and_then(|()| self.save(&mut member))
                    } else {
                        Ok(())
                    }
                }
            };

            if let Err(error) = result
                && let Err(error) =
                    record_failure(failures, reflection.name, member.pid().cloned(), error, halt)
            {
                entity.associations_mut().reset(reflection.name);
                return Err(error);
            }
        }

        Ok(())
    }

    fn sever_habtm(
        &self,
        entity: &mut Entity,
        reflection: &'static ReflectionModel,
        failures: &mut Vec<RelationshipFailure>,
    ) -> Result<(), InternalError> {
        let Some(inverse) = reflection.inverse()? else {
            return Ok(());
        };
        let halt = self.config().delete.halt_on_relationship_failure;
        let inverse_key = inverse.owner_foreign_key()?;
        let Some(owner_pid) = entity.pid().cloned() else {
            return Ok(());
        };

        if let Err(error) = self.collection(entity, reflection.name)?.load_target() {
            return record_failure(failures, reflection.name, None, error, halt);
        }

        let members = entity.associations_mut().entry(reflection.name).take_members();
        for mut member in members {
            let mut ids = member.foreign_key_ids(inverse_key);
            if !ids.contains(&owner_pid) {
                continue;
            }
            ids.retain(|pid| *pid != owner_pid);

            let result = member
                .set(inverse_key, id_list(&ids))
                .and_then(|()| self.save(&mut member));
            if let Err(error) = result
                && let Err(error) =
                    record_failure(failures, reflection.name, member.pid().cloned(), error, halt)
            {
                entity.associations_mut().reset(reflection.name);
                return Err(error);
            }
        }

        Ok(())
    }
}

// Run `f` over an association's cached members, restoring them afterwards.
fn for_each_member(
    entity: &mut Entity,
    name: &'static str,
    mut f: impl FnMut(&mut Entity) -> Result<(), InternalError>,
) -> Result<(), InternalError> {
    let Some(entry) = entity.associations_mut().get_mut(name) else {
        return Ok(());
    };
    let mut members = entry.take_members();
    let result = members.iter_mut().try_for_each(&mut f);
    *entity.associations_mut().entry(name).members_mut() = members;

    result
}

// Halt propagates the error; otherwise it is logged and collected.
fn record_failure(
    failures: &mut Vec<RelationshipFailure>,
    reflection: &'static str,
    member: Option<Pid>,
    error: InternalError,
    halt: bool,
) -> Result<(), InternalError> {
    if halt {
        return Err(error);
    }
    warn!(
        reflection,
        member = ?member,
        error = %error,
        "relationship removal failed; continuing"
    );
    failures.push(RelationshipFailure {
        reflection,
        member,
        error,
    });

    Ok(())
}

// Caches whose foreign key changed behind their back go stale; caches the
// proxies updated in place stay loaded.
fn refresh_caches(entity: &mut Entity, changed: &[&'static str]) {
    let model = entity.model();
    let cache = entity.associations_mut();

    for reflection in model.all_reflections() {
        let Some(foreign_key) = reflection.foreign_key else {
            continue;
        };
        let Some(entry) = cache.get_mut(reflection.name) else {
            continue;
        };
        if changed.contains(&foreign_key) && !entry.is_updated() {
            entry.mark_stale();
        }
        entry.set_updated(false);
    }
}
