use crate::db::entity::Entity;
use std::collections::BTreeMap;

///
/// CacheState
///
/// ```text
/// Unloaded -> Loading -> Loaded
/// Loaded   -> Stale      (reload, foreign-key replacement, divergence)
/// Stale    -> Loading    (next access)
/// ```
/// A failed load returns the entry to the state it was in before `Loading`.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CacheState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Stale,
}

impl CacheState {
    #[must_use]
    pub const fn needs_load(self) -> bool {
        matches!(self, Self::Unloaded | Self::Stale)
    }
}

///
/// AssociationEntry
///

#[derive(Clone, Debug)]
pub struct AssociationEntry {
    state: CacheState,
    single: Option<Box<Entity>>,
    members: Vec<Entity>,
    /// Set when the target was replaced in memory and not yet saved.
    updated: bool,
}

impl AssociationEntry {
    pub(crate) const fn new() -> Self {
        Self {
            state: CacheState::Unloaded,
            single: None,
            members: Vec::new(),
            updated: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CacheState {
        self.state
    }

    #[must_use]
    pub const fn is_updated(&self) -> bool {
        self.updated
    }

    /// Enter `Loading`; returns the state to restore if the load fails.
    pub(crate) const fn begin_load(&mut self) -> CacheState {
        let previous = self.state;
        self.state = CacheState::Loading;

        previous
    }

    pub(crate) const fn abort_load(&mut self, previous: CacheState) {
        self.state = previous;
    }

    pub(crate) const fn set_state(&mut self, state: CacheState) {
        self.state = state;
    }

    pub(crate) const fn set_updated(&mut self, updated: bool) {
        self.updated = updated;
    }

    /// Keep the target but force the next access to re-query.
    pub(crate) fn mark_stale(&mut self) {
        if self.state != CacheState::Unloaded {
            self.state = CacheState::Stale;
        }
    }

    /// Drop the target entirely.
    pub(crate) fn reset(&mut self) {
        self.state = CacheState::Unloaded;
        self.updated = false;
        self.single = None;
        self.members.clear();
    }

    #[must_use]
    pub fn single_target(&self) -> Option<&Entity> {
        self.single.as_deref()
    }

    pub(crate) fn set_single(&mut self, target: Option<Entity>) {
        self.single = target.map(Box::new);
    }

    #[must_use]
    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    pub(crate) const fn members_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.members
    }

    pub(crate) fn take_members(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.members)
    }
}

///
/// AssociationCache
///
/// Per-entity cache keyed by reflection name. Never persisted.
///

#[derive(Clone, Debug, Default)]
pub struct AssociationCache {
    entries: BTreeMap<&'static str, AssociationEntry>,
}

impl AssociationCache {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AssociationEntry> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut AssociationEntry> {
        self.entries.get_mut(name)
    }

    pub(crate) fn entry(&mut self, name: &'static str) -> &mut AssociationEntry {
        self.entries.entry(name).or_insert_with(AssociationEntry::new)
    }

    #[must_use]
    pub fn state(&self, name: &str) -> CacheState {
        self.entries
            .get(name)
            .map_or(CacheState::Unloaded, AssociationEntry::state)
    }

    pub(crate) fn reset(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.reset();
        }
    }

    pub(crate) fn mark_stale(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.mark_stale();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&'static str, &mut AssociationEntry)> {
        self.entries.iter_mut().map(|(name, entry)| (*name, entry))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_load_restores_previous_state() {
        let mut entry = AssociationEntry::new();
        entry.set_state(CacheState::Stale);

        let previous = entry.begin_load();
        assert_eq!(entry.state(), CacheState::Loading);

        entry.abort_load(previous);
        assert_eq!(entry.state(), CacheState::Stale);
    }

    #[test]
    fn mark_stale_leaves_unloaded_entries_alone() {
        let mut entry = AssociationEntry::new();
        entry.mark_stale();
        assert_eq!(entry.state(), CacheState::Unloaded);

        entry.set_state(CacheState::Loaded);
        entry.mark_stale();
        assert_eq!(entry.state(), CacheState::Stale);
        assert!(entry.state().needs_load());
    }

    #[test]
    fn reset_clears_updated_flag_and_state() {
        let mut entry = AssociationEntry::new();
        entry.set_state(CacheState::Loaded);
        entry.set_updated(true);

        entry.reset();

        assert_eq!(entry.state(), CacheState::Unloaded);
        assert!(!entry.is_updated());
        assert!(entry.single_target().is_none());
    }
}
