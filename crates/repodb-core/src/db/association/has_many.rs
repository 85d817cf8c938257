//! has_many: membership is the inverse foreign key stored on each member.

use crate::{
    db::{
        association::{CollectionProxy, reify::Reified},
        entity::Entity,
        search::{
            QueryOptions, SearchClient, SolrDocument,
            query::{Join, construct_query_for_rel, group, relationship_field},
        },
        store::StorageClient,
    },
    error::InternalError,
    types::Pid,
    value::Value,
};
use tracing::debug;

impl<S: StorageClient, I: SearchClient> CollectionProxy<'_, S, I> {
    pub(super) fn fetch_has_many(&self) -> Result<Reified, InternalError> {
        let query = self.has_many_query()?;
        let rows = self.db.config().search.max_rows;
        let hits = self.db.select(&query, &QueryOptions::rows(rows))?;

        self.db
            .reify(self.reflection.name, self.reflection.target, hits)
    }

    pub(super) fn has_many_ids(&self) -> Result<Vec<Pid>, InternalError> {
        let query = self.has_many_query()?;
        let rows = self.db.config().search.max_rows;
        let hits = self.db.select(&query, &QueryOptions::rows(rows))?;

        Ok(hits
            .iter()
            .filter_map(SolrDocument::id)
            .map(Pid::new)
            .collect())
    }

    pub(super) fn has_many_count(&self) -> Result<usize, InternalError> {
        let query = self.has_many_query()?;

        self.db.count_hits(&query)
    }

    /// Point a member's inverse foreign key at the owner and save it. Members
    /// of an unsaved owner stay pending until the owner is created.
    pub(super) fn insert_has_many(&self, member: &mut Entity) -> Result<(), InternalError> {
        if self.link_to_owner(member)? {
            debug!(
                member = %member.describe(),
                reflection = self.reflection.name,
                "saving has_many member"
            );
            self.db.save(member)?;
        }

        Ok(())
    }

    /// Clear the member's inverse foreign key if it points at the owner.
    pub(super) fn detach_has_many(&self, member: &mut Entity) -> Result<(), InternalError> {
        let foreign_key = self.member_foreign_key()?;
        if member.foreign_key_id(foreign_key).as_ref() == self.owner.pid() {
            member.set(foreign_key, Value::Null)?;
        }
        if member.is_persisted() {
            self.db.save(member)?;
        }

        Ok(())
    }

    /// Set the member's inverse foreign key to the owner's identifier.
    /// Returns false while the owner is unsaved.
    pub(super) fn link_to_owner(&self, member: &mut Entity) -> Result<bool, InternalError> {
        let Some(owner_pid) = self.owner.pid().filter(|_| self.owner.is_persisted()) else {
            return Ok(false);
        };
        member.set(self.member_foreign_key()?, owner_pid)?;

        Ok(true)
    }

    fn member_foreign_key(&self) -> Result<&'static str, InternalError> {
        Ok(self.reflection.member_foreign_key()?.owner_foreign_key()?)
    }

    // Members assert the inverse predicate against the owner's URI.
    fn has_many_query(&self) -> Result<String, InternalError> {
        let owner_pid = self.owner.pid().ok_or_else(|| {
            InternalError::never_persisted("query members of", &self.owner.describe())
        })?;
        let inverse = self.reflection.member_foreign_key()?;
        let field = relationship_field(inverse.predicate);
        let owner_uri = self.db.uri_for(owner_pid);

        Ok(group(
            &[
                construct_query_for_rel(&[(&field, &owner_uri)], Join::And),
                self.db.type_clause(self.reflection.target),
            ],
            Join::And,
        ))
    }
}
