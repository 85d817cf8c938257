use crate::{
    db::{
        Db,
        association::{AssociationEntry, CacheState, ensure_target_type, reify::Reified},
        entity::Entity,
        search::SearchClient,
        store::StorageClient,
    },
    error::InternalError,
    model::{AssociationKind, ReflectionModel},
    obs::MetricsEvent,
    types::Pid,
    value::Value,
};
use tracing::debug;

///
/// CollectionProxy
///
/// has_many / has_and_belongs_to_many access for one owner. Members are
/// cached in the owner's association cache and resolved lazily.
///
/// Unsaved owners never query: their collections hold only in-memory members,
/// which are flushed when the owner is created.
///

pub struct CollectionProxy<'a, S: StorageClient, I: SearchClient> {
    pub(super) db: &'a Db<S, I>,
    pub(super) owner: &'a mut Entity,
    pub(super) reflection: &'static ReflectionModel,
}

impl<'a, S: StorageClient, I: SearchClient> CollectionProxy<'a, S, I> {
    pub(crate) const fn new(
        db: &'a Db<S, I>,
        owner: &'a mut Entity,
        reflection: &'static ReflectionModel,
    ) -> Self {
        Self {
            db,
            owner,
            reflection,
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

    /// Cached members without triggering a load.
    #[must_use]
    pub fn members(&self) -> &[Entity] {
        self.owner
            .associations()
            .get(self.reflection.name)
            .map(AssociationEntry::members)
            .unwrap_or_default()
    }

    /// Cached member by identifier, for in-place edits.
    pub fn member_mut(&mut self, pid: &Pid) -> Option<&mut Entity> {
        self.entry()
            .members_mut()
            .iter_mut()
            .find(|member| member.pid() == Some(pid))
    }

    /// Resolve members if the cache is unloaded or stale, merging the result
    /// with members already held in memory.
    pub fn load_target(&mut self) -> Result<&[Entity], InternalError> {
        if self.owner.is_new() {
            self.entry().set_state(CacheState::Loaded);
            return Ok(self.members());
        }
        if !self.state().needs_load() {
            return Ok(self.members());
        }

        let name = self.reflection.name;
        let previous = self.entry().begin_load();
        let fetched = match self.reflection.kind {
            AssociationKind::HasMany => self.fetch_has_many(),
            AssociationKind::HasAndBelongsToMany => self.fetch_habtm(),
            AssociationKind::BelongsTo => Err(InternalError::association_invariant(format!(
                "'{name}' is not a collection"
            ))),
        };

        match fetched {
            Ok(reified) => {
                self.db
                    .record(MetricsEvent::AssociationLoad { reflection: name });
                let diverged = reified.diverged;
                let pending = self.pending_members();
                let entry = self.entry();
                merge(entry, reified, &pending);
                entry.set_state(if diverged {
                    CacheState::Stale
                } else {
                    CacheState::Loaded
                });
                debug!(
                    reflection = name,
                    members = entry.members().len(),
                    diverged,
                    "collection loaded"
                );

                Ok(self.members())
            }
            Err(err) => {
                self.entry().abort_load(previous);
                Err(err)
            }
        }
    }

    /// Force a re-query. Cached members the index no longer returns are
    /// dropped unless they are still pending toward this owner.
    pub fn reload(&mut self) -> Result<&[Entity], InternalError> {
        self.owner.associations_mut().mark_stale(self.reflection.name);

        self.load_target()
    }

    /// Drop every cached member; the next access re-queries.
    pub fn reset(&mut self) {
        self.owner.associations_mut().reset(self.reflection.name);
    }

    /// Member identifiers. has_and_belongs_to_many reads the foreign key
    /// array; has_many uses the cache when loaded, otherwise an id-only query.
    pub fn ids(&self) -> Result<Vec<Pid>, InternalError> {
        match self.reflection.kind {
            AssociationKind::HasAndBelongsToMany => {
                Ok(self.owner.foreign_key_ids(self.reflection.owner_foreign_key()?))
            }
            _ => {
                if self.owner.is_new() || self.state() == CacheState::Loaded {
                    return Ok(self
                        .members()
                        .iter()
                        .filter_map(Entity::pid)
                        .cloned()
                        .collect());
                }
                self.has_many_ids()
            }
        }
    }

    /// Replace membership with the entities stored under `ids`.
    pub fn set_ids(&mut self, ids: &[Pid]) -> Result<(), InternalError> {
        let members = ids
            .iter()
            .map(|pid| self.db.find_as(self.reflection.target, pid))
            .collect::<Result<Vec<_>, _>>()?;

        self.replace(members)
    }

    /// Append members. Every candidate is type-checked before anything is
    /// written; re-adding a cached member keeps that copy's unsaved edits.
    pub fn concat(&mut self, members: Vec<Entity>) -> Result<(), InternalError> {
        for member in &members {
            ensure_target_type(self.reflection, member)?;
        }
        self.load_target()?;

        for member in members {
            self.insert(member)?;
        }

        Ok(())
    }

    /// New in-memory member; saved with the owner.
    pub fn build<K, V>(
        &mut self,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<&mut Entity, InternalError>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut member = Entity::new(self.reflection.target);
        member.assign(attributes)?;
        if self.reflection.kind == AssociationKind::HasMany {
            self.link_to_owner(&mut member)?;
        }

        let members = self.entry().members_mut();
        members.push(member);
        members
            .last_mut()
            .ok_or_else(|| InternalError::association_invariant("built member vanished"))
    }

    /// Build, save, and attach a member. The owner must already be saved.
    pub fn create<K, V>(
        &mut self,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<&Entity, InternalError>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        if !self.owner.is_persisted() {
            return Err(InternalError::record_not_saved(format!(
                "can't create '{}' members of {} before it has been saved",
                self.reflection.name,
                self.owner.describe()
            )));
        }

        let mut member = Entity::new(self.reflection.target);
        member.assign(attributes)?;
        self.load_target()?;
        let index = self.insert(member)?;

        self.members()
            .get(index)
            .ok_or_else(|| InternalError::association_invariant("created member vanished"))
    }

    /// Detach the members with the given identifiers.
    ///
    /// has_many nullifies each member's foreign key and saves it;
    /// has_and_belongs_to_many removes the ids from the owner's array and the
    /// owner from each member's inverse array.
    pub fn delete(&mut self, ids: &[Pid]) -> Result<(), InternalError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.load_target()?;

        let members = self.entry().take_members();
        let mut kept = Vec::with_capacity(members.len());
        let mut outcome = Ok(());

        for mut member in members {
            let selected = member.pid().is_some_and(|pid| ids.contains(pid));
            if !selected || outcome.is_err() {
                kept.push(member);
                continue;
            }
            if let Err(err) = self.detach(&mut member) {
                kept.push(member);
                outcome = Err(err);
            }
        }
        *self.entry().members_mut() = kept;
        outcome?;

        if self.reflection.kind == AssociationKind::HasAndBelongsToMany {
            self.remove_owner_ids(ids)?;
        }

        Ok(())
    }

    /// Make membership equal `members`: detach what's missing, attach what's new.
    pub fn replace(&mut self, members: Vec<Entity>) -> Result<(), InternalError> {
        for member in &members {
            ensure_target_type(self.reflection, member)?;
        }
        self.load_target()?;

        let current: Vec<Pid> = self
            .members()
            .iter()
            .filter_map(Entity::pid)
            .cloned()
            .collect();
        let removed: Vec<Pid> = current
            .iter()
            .filter(|pid| !members.iter().any(|m| m.pid() == Some(*pid)))
            .cloned()
            .collect();
        self.delete(&removed)?;

        for member in members {
            let existing = member.pid().is_some_and(|pid| current.contains(pid));
            if !existing {
                self.insert(member)?;
            }
        }

        Ok(())
    }

    /// Member count. Loaded caches and unsaved owners count in memory;
    /// otherwise the index is asked, plus any unsaved in-memory members.
    pub fn size(&self) -> Result<usize, InternalError> {
        if self.owner.is_new() || self.state() == CacheState::Loaded {
            return Ok(self.members().len());
        }
        let unsaved = self.members().iter().filter(|m| m.is_new()).count();

        let indexed = match self.reflection.kind {
            AssociationKind::HasAndBelongsToMany => self.habtm_count()?,
            _ => self.has_many_count()?,
        };

        Ok(indexed + unsaved)
    }

    ///
    /// INTERNAL
    ///

    pub(super) fn entry(&mut self) -> &mut AssociationEntry {
        self.owner.associations_mut().entry(self.reflection.name)
    }

    // Attach one member; returns its position in the cache.
    fn insert(&mut self, mut member: Entity) -> Result<usize, InternalError> {
        match self.reflection.kind {
            AssociationKind::HasAndBelongsToMany => self.insert_habtm(&mut member)?,
            _ => self.insert_has_many(&mut member)?,
        }

        let members = self.entry().members_mut();
        let position = member
            .pid()
            .and_then(|pid| members.iter().position(|m| m.pid() == Some(pid)));

        Ok(match position {
            Some(index) => {
                members[index].merge_fetched(&member);
                index
            }
            None => {
                members.push(member);
                members.len() - 1
            }
        })
    }

    fn detach(&mut self, member: &mut Entity) -> Result<(), InternalError> {
        match self.reflection.kind {
            AssociationKind::HasAndBelongsToMany => self.detach_habtm(member),
            _ => self.detach_has_many(member),
        }
    }

    fn pending_members(&self) -> PendingMembers {
        let foreign_key = match self.reflection.kind {
            AssociationKind::HasMany => self
                .reflection
                .member_foreign_key()
                .ok()
                .and_then(|inverse| inverse.foreign_key),
            _ => None,
        };

        PendingMembers {
            owner: self.owner.pid().cloned(),
            foreign_key,
        }
    }
}

///
/// PendingMembers
///
/// Which cached members survive a re-query that did not return them:
/// unsaved members, and has_many members whose unsaved foreign key points
/// at the owner.
///

struct PendingMembers {
    owner: Option<Pid>,
    foreign_key: Option<&'static str>,
}

impl PendingMembers {
    fn holds(&self, member: &Entity) -> bool {
        if member.is_new() {
            return true;
        }
        let Some(foreign_key) = self.foreign_key else {
            return false;
        };

        member.attribute_changed(foreign_key)
            && self.owner.is_some()
            && member.foreign_key_id(foreign_key) == self.owner
    }
}

// Fetched order first; matching in-memory instances are kept with their
// local changes. Unmatched in-memory members follow only while pending.
fn merge(entry: &mut AssociationEntry, fetched: Reified, pending: &PendingMembers) {
    let mut existing = entry.take_members();
    let mut merged = Vec::with_capacity(fetched.entities.len() + existing.len());

    for member in fetched.entities {
        let position = member
            .pid()
            .and_then(|pid| existing.iter().position(|m| m.pid() == Some(pid)));
        match position {
            Some(index) => {
                let mut kept = existing.remove(index);
                kept.merge_fetched(&member);
                merged.push(kept);
            }
            None => merged.push(member),
        }
    }
    for member in existing {
        if pending.holds(&member) {
            merged.push(member);
        } else {
            debug!(member = %member.describe(), "dropping member missing from re-query");
        }
    }

    *entry.members_mut() = merged;
}
