use crate::{
    error::InternalError,
    model::{EntityModel, MappingError, validate_model},
};
use tracing::debug;

///
/// ClassRegistry
///
/// Entity classes known to a `Db`. Drives subclass expansion of type clauses,
/// pinned-target detection, and concrete-class selection from stored
/// `hasModel` assertions.
///

#[derive(Debug, Default)]
pub struct ClassRegistry {
    models: Vec<&'static EntityModel>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a class.
    pub fn register(&mut self, model: &'static EntityModel) -> Result<(), InternalError> {
        if self.contains(model) {
            return Err(MappingError::DuplicateModel { model: model.name }.into());
        }
        validate_model(model)?;

        debug!(model = model.name, path = model.path, "registered class");
        self.models.push(model);

        Ok(())
    }

    #[must_use]
    pub fn contains(&self, model: &EntityModel) -> bool {
        self.models.iter().any(|m| *m == model)
    }

    #[must_use]
    pub fn models(&self) -> &[&'static EntityModel] {
        &self.models
    }

    /// Registered strict subclasses of `model`, in registration order.
    #[must_use]
    pub fn descendants(&self, model: &'static EntityModel) -> Vec<&'static EntityModel> {
        self.models
            .iter()
            .copied()
            .filter(|m| *m != model && m.is_kind_of(model))
            .collect()
    }

    /// A pinned class has no registered subclasses and isn't the base class,
    /// so its instances can be fetched directly without a type query.
    #[must_use]
    pub fn is_pinned(&self, model: &'static EntityModel) -> bool {
        !model.is_base() && self.descendants(model).is_empty()
    }

    /// `model` followed by its registered subclasses.
    #[must_use]
    pub fn candidates(&self, model: &'static EntityModel) -> Vec<&'static EntityModel> {
        let mut out = vec![model];
        out.extend(self.descendants(model));

        out
    }

    #[must_use]
    pub fn model_for_uri(&self, class_uri: &str) -> Option<&'static EntityModel> {
        self.models
            .iter()
            .copied()
            .find(|m| m.class_uri() == class_uri)
    }

    /// Most specific registered class among `class_uris`; ties go to the
    /// earliest assertion.
    pub fn best_model<'a>(
        &self,
        class_uris: impl IntoIterator<Item = &'a str>,
    ) -> Option<&'static EntityModel> {
        let mut best: Option<&'static EntityModel> = None;
        for model in class_uris.into_iter().filter_map(|uri| self.model_for_uri(uri)) {
            if best.is_none_or(|current| model.depth() > current.depth()) {
                best = Some(model);
            }
        }

        best
    }
}

///
/// TESTS
///
