//! has_and_belongs_to_many: membership is the owner's foreign key array,
//! optionally mirrored by an inverse array on each member.

use crate::{
    db::{
        association::{CollectionProxy, id_list, reify::Reified},
        entity::Entity,
        search::{
            QueryOptions, SearchClient,
            query::{Join, construct_query_for_ids, group},
        },
        store::StorageClient,
    },
    error::InternalError,
    types::Pid,
};
use tracing::debug;

impl<S: StorageClient, I: SearchClient> CollectionProxy<'_, S, I> {
    /// One id query per batch, `rows` = batch size; results concatenated in
    /// batch order.
    pub(super) fn fetch_habtm(&self) -> Result<Reified, InternalError> {
        let batch_size = self.batch_size()?;
        let type_clause = self.db.type_clause(self.reflection.target);
        let mut out = Reified::default();

        for batch in self.owner_ids()?.chunks(batch_size) {
            let query = group(
                &[construct_query_for_ids(batch), type_clause.clone()],
                Join::And,
            );
            let hits = self.db.select(&query, &QueryOptions::rows(batch_size))?;
            debug!(
                reflection = self.reflection.name,
                batch = batch.len(),
                hits = hits.len(),
                "habtm batch"
            );

            out.extend(
                self.db
                    .reify(self.reflection.name, self.reflection.target, hits)?,
            );
        }

        Ok(out)
    }

    pub(super) fn habtm_count(&self) -> Result<usize, InternalError> {
        let batch_size = self.batch_size()?;
        let type_clause = self.db.type_clause(self.reflection.target);
        let mut total = 0;

        for batch in self.owner_ids()?.chunks(batch_size) {
            let query = group(
                &[construct_query_for_ids(batch), type_clause.clone()],
                Join::And,
            );
            total += self.db.count_hits(&query)?;
        }

        Ok(total)
    }

    /// Save the member if new, record it in the owner's array, and mirror the
    /// owner into the member's inverse array when both sides are saved.
    pub(super) fn insert_habtm(&mut self, member: &mut Entity) -> Result<(), InternalError> {
        if member.is_new() {
            self.db.save(member)?;
        }
        let member_pid = member.pid().cloned().ok_or_else(|| {
            InternalError::association_invariant(format!(
                "{} has no identifier after save",
                member.describe()
            ))
        })?;

        let foreign_key = self.reflection.owner_foreign_key()?;
        let mut ids = self.owner.foreign_key_ids(foreign_key);
        if !ids.contains(&member_pid) {
            ids.push(member_pid);
            self.owner.write_raw(foreign_key, id_list(&ids))?;
            self.entry().set_updated(true);
        }

        if self.owner.is_persisted() {
            self.link_inverse(member)?;
        }

        Ok(())
    }

    /// Remove the owner from the member's inverse array.
    pub(super) fn detach_habtm(&self, member: &mut Entity) -> Result<(), InternalError> {
        let Some(inverse) = self.reflection.inverse()? else {
            return Ok(());
        };
        let Some(owner_pid) = self.owner.pid() else {
            return Ok(());
        };
        let inverse_key = inverse.owner_foreign_key()?;

        let mut ids = member.foreign_key_ids(inverse_key);
        let before = ids.len();
        ids.retain(|pid| pid != owner_pid);
        if ids.len() != before {
            member.set(inverse_key, id_list(&ids))?;
            self.db.save(member)?;
        }

        Ok(())
    }

    pub(super) fn remove_owner_ids(&mut self, removed: &[Pid]) -> Result<(), InternalError> {
        let foreign_key = self.reflection.owner_foreign_key()?;
        let mut ids = self.owner.foreign_key_ids(foreign_key);
        ids.retain(|pid| !removed.contains(pid));
        if self.owner.write_raw(foreign_key, id_list(&ids))? {
            self.entry().set_updated(true);
        }

        Ok(())
    }

    // Add the owner to the member's inverse array and save the member.
    fn link_inverse(&self, member: &mut Entity) -> Result<(), InternalError> {
        let Some(inverse) = self.reflection.inverse()? else {
            return Ok(());
        };
        let Some(owner_pid) = self.owner.pid() else {
            return Ok(());
        };
        let inverse_key = inverse.owner_foreign_key()?;

        let mut ids = member.foreign_key_ids(inverse_key);
        if !ids.contains(owner_pid) {
            ids.push(owner_pid.clone());
            member.set(inverse_key, id_list(&ids))?;
            self.db.save(member)?;
        }

        Ok(())
    }

    fn owner_ids(&self) -> Result<Vec<Pid>, InternalError> {
        Ok(self
            .owner
            .foreign_key_ids(self.reflection.owner_foreign_key()?))
    }

    fn batch_size(&self) -> Result<usize, InternalError> {
        Ok(self
            .reflection
            .batch_size(self.db.config().search.page_size)?)
    }
}
