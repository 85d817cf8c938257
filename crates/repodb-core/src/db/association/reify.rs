use crate::{
    config::ReifyStrategy,
    db::{
        Db,
        entity::{Entity, IndexProfile},
        search::{HAS_MODEL_FIELD, SearchClient, SolrDocument},
        store::{StorageClient, StoreError},
    },
    error::InternalError,
    model::EntityModel,
    obs::MetricsEvent,
    types::Pid,
};
use tracing::{debug, warn};

///
/// Reified
///
/// Entities built from index hits, in hit order. `diverged` is set when at
/// least one hit referenced an object storage no longer holds.
///

#[derive(Debug, Default)]
pub(crate) struct Reified {
    pub(crate) entities: Vec<Entity>,
    pub(crate) diverged: bool,
}

impl Reified {
    pub(crate) fn extend(&mut self, other: Self) {
        self.entities.extend(other.entities);
        self.diverged |= other.diverged;
    }
}

impl<S: StorageClient, I: SearchClient> Db<S, I> {
    /// Turn index hits into entities of `target` (or its most specific
    /// registered subclass).
    pub(crate) fn reify(
        &self,
        reflection: &'static str,
        target: &'static EntityModel,
        documents: Vec<SolrDocument>,
    ) -> Result<Reified, InternalError> {
        let mut out = Reified::default();

        for document in documents {
            let Some(id) = document.id() else {
                warn!(reflection, "index hit without an id; skipping");
                continue;
            };
            let pid = Pid::new(id);
            let model = self.concrete_model(target, &document);

            if self.config().reify.strategy == ReifyStrategy::Document
                && let Some(blob) = IndexProfile::from_document(&document)
            {
                debug!(%pid, model = model.name, "reified from index profile");
                out.entities.push(Entity::from_index_profile(model, pid, blob));
                continue;
            }

            match self.fetch_record(&pid) {
                Ok(record) => {
                    out.entities
                        .push(Entity::from_record(model, &record, self.translator()));
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(%pid, reflection, "index hit has no stored object; dropping");
                    self.record(MetricsEvent::Divergence { reflection });
                    out.diverged = true;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(out)
    }

    // Most specific registered class asserted by the hit, constrained to the
    // association's target.
    fn concrete_model(
        &self,
        target: &'static EntityModel,
        document: &SolrDocument,
    ) -> &'static EntityModel {
        self.registry()
            .best_model(document.values(HAS_MODEL_FIELD))
            .filter(|model| model.is_kind_of(target))
            .unwrap_or(target)
    }
}
