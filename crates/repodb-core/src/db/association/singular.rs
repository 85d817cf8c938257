use crate::{
    db::{
        Db,
        association::{CacheState, ensure_target_type},
        entity::Entity,
        search::{
            QueryOptions, SearchClient,
            query::{Join, construct_query_for_ids, group},
        },
        store::{StorageClient, StoreError},
    },
    error::InternalError,
    model::ReflectionModel,
    obs::MetricsEvent,
    types::Pid,
    value::Value,
};
use tracing::{debug, warn};

///
/// SingularProxy
///
/// belongs_to access for one owner. The foreign key lives on the owner; the
/// resolved target is cached in the owner's association cache.
///

pub struct SingularProxy<'a, S: StorageClient, I: SearchClient> {
    db: &'a Db<S, I>,
    owner: &'a mut Entity,
    reflection: &'static ReflectionModel,
    foreign_key: &'static str,
}

impl<'a, S: StorageClient, I: SearchClient> SingularProxy<'a, S, I> {
    pub(crate) const fn new(
        db: &'a Db<S, I>,
        owner: &'a mut Entity,
        reflection: &'static ReflectionModel,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            db,
            owner,
            reflection,
            foreign_key,
        }
    }

    #[must_use]
    pub const fn reflection(&self) -> &'static ReflectionModel {
        self.reflection
    }

    #[must_use]
    pub fn state(&self) -> CacheState {
        self.owner.associations().state(self.reflection.name)
    }

    /// Foreign key value; no query.
    #[must_use]
    pub fn id(&self) -> Option<Pid> {
        self.owner.foreign_key_id(self.foreign_key)
    }

    /// Resolve the target. A missing foreign key resolves to `None` without a
    /// query; a dangling one resolves to `None` and is logged.
    pub fn target(&mut self) -> Result<Option<&Entity>, InternalError> {
        let name = self.reflection.name;

        if self.state().needs_load() {
            let resolved = match self.id() {
                None => None,
                Some(pid) => {
                    let previous = self.owner.associations_mut().entry(name).begin_load();
                    match self.resolve(&pid) {
                        Ok(target) => target,
                        Err(err) => {
                            self.owner
                                .associations_mut()
                                .entry(name)
                                .abort_load(previous);
                            return Err(err);
                        }
                    }
                }
            };

            let entry = self.owner.associations_mut().entry(name);
            entry.set_single(resolved);
            entry.set_state(CacheState::Loaded);
        }

        Ok(self
            .owner
            .associations()
            .get(name)
            .and_then(|entry| entry.single_target()))
    }

    /// Point the foreign key at `target` (or clear it). The target must be
    /// saved; the owner itself is not.
    pub fn replace(&mut self, target: Option<Entity>) -> Result<(), InternalError> {
        let value = match &target {
            Some(candidate) => {
                ensure_target_type(self.reflection, candidate)?;
                let Some(pid) = candidate.pid().filter(|_| !candidate.is_new()) else {
                    return Err(InternalError::record_not_saved(format!(
                        "can't assign {} to '{}' before it has been saved",
                        candidate.describe(),
                        self.reflection.name
                    )));
                };
                Value::from(pid)
            }
            None => Value::Null,
        };

        self.owner.write_raw(self.foreign_key, value)?;

        let entry = self.owner.associations_mut().entry(self.reflection.name);
        entry.set_single(target);
        entry.set_state(CacheState::Loaded);
        entry.set_updated(true);

        Ok(())
    }

    /// Drop the cached target; the foreign key is untouched.
    pub fn reset(&mut self) {
        self.owner.associations_mut().reset(self.reflection.name);
    }

    fn resolve(&self, pid: &Pid) -> Result<Option<Entity>, InternalError> {
        let name = self.reflection.name;
        let target = self.reflection.target;
        self.db.record(MetricsEvent::AssociationLoad { reflection: name });

        let found = if self.db.registry().is_pinned(target) {
            debug!(%pid, reflection = name, "direct fetch of pinned target");
            match self.db.fetch_record(pid) {
                Ok(record) => Some(Entity::from_record(target, &record, self.db.translator())),
                Err(StoreError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            }
        } else {
            let query = group(
                &[
                    construct_query_for_ids(std::slice::from_ref(pid)),
                    self.db.type_clause(target),
                ],
                Join::And,
            );
            let hits = self.db.select(&query, &QueryOptions::rows(1))?;

            self.db.reify(name, target, hits)?.entities.into_iter().next()
        };

        if found.is_none() {
            warn!(%pid, reflection = name, owner = %self.owner.describe(), "dangling foreign key");
            self.db
                .record(MetricsEvent::DanglingReference { reflection: name });
        }

        Ok(found)
    }
}
