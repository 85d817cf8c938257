use crate::{
    db::{
        Db,
        entity::Entity,
        search::{QueryOptions, SearchClient, query::MATCH_ALL},
        store::{ObjectRecord, StorageClient},
    },
    error::InternalError,
    model::{BASE, EntityModel, HAS_MODEL_PREDICATE, RELS_EXT},
    rdf::Term,
    types::Pid,
};

impl<S: StorageClient, I: SearchClient> Db<S, I> {
    /// Load by identifier as the most specific class the object asserts.
    /// Objects asserting no registered class load as the base class.
    pub fn find(&self, pid: &Pid) -> Result<Entity, InternalError> {
        let record = self.fetch_record(pid)?;
        let model = self.stored_model(&record).unwrap_or(&BASE);

        Ok(Entity::from_record(model, &record, self.translator()))
    }

    /// Load by identifier, requiring the stored class to be `model` or one of
    /// its subclasses.
    pub fn find_as(
        &self,
        model: &'static EntityModel,
        pid: &Pid,
    ) -> Result<Entity, InternalError> {
        let record = self.fetch_record(pid)?;

        let concrete = match self.stored_model(&record) {
            Some(stored) if stored.is_kind_of(model) => stored,
            Some(stored) => {
                return Err(InternalError::class_mismatch(pid, model.name, stored.name));
            }
            None => model,
        };

        Ok(Entity::from_record(concrete, &record, self.translator()))
    }

    /// Every indexed instance of `model` and its subclasses, in index order,
    /// capped by `search.max_rows`.
    pub fn all(&self, model: &'static EntityModel) -> Result<Vec<Entity>, InternalError> {
        let query = self.model_query(model);
        let rows = self.config().search.max_rows;
        let hits = self.select(&query, &QueryOptions::rows(rows))?;

        Ok(self.reify(model.name, model, hits)?.entities)
    }

    /// Indexed instance count of `model` and its subclasses.
    pub fn count(&self, model: &'static EntityModel) -> Result<usize, InternalError> {
        self.count_hits(&self.model_query(model))
    }

    pub fn exists(&self, pid: &Pid) -> Result<bool, InternalError> {
        Ok(self.storage().exists(pid)?)
    }

    fn model_query(&self, model: &'static EntityModel) -> String {
        let clause = self.type_clause(model);
        if clause.is_empty() {
            MATCH_ALL.to_string()
        } else {
            clause
        }
    }

    // Most specific registered class among the record's hasModel assertions.
    fn stored_model(&self, record: &ObjectRecord) -> Option<&'static EntityModel> {
        let graph = record.graph(RELS_EXT)?;
        let subject = self.uri_for(&record.pid);

        self.registry().best_model(
            graph
                .objects(&subject, HAS_MODEL_PREDICATE)
                .filter_map(Term::as_uri),
        )
    }
}
