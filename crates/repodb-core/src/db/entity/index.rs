//! Index document shape.
//!
//! Every persisted entity is flattened into one [`SolrDocument`]: identifier,
//! relationship fields (type assertions included), property fields,
//! timestamps, and a JSON profile blob that lets search hits be reified
//! without a storage round trip.

use super::{Entity, EntityState, Hydration, conform};
use crate::{
    db::{
        search::{SolrDocument, query::relationship_field},
        store::ObjectProfile,
    },
    error::InternalError,
    model::EntityModel,
    rdf::Term,
    types::{Pid, UriTranslator},
    value::Value,
};
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;

/// Stored JSON profile blob.
pub const PROFILE_FIELD: &str = "object_profile_ssm";

pub const CREATED_FIELD: &str = "system_create_dtsi";

pub const MODIFIED_FIELD: &str = "system_modified_dtsi";

/// Class name of the entity that wrote the document.
pub const MODEL_NAME_FIELD: &str = "active_fedora_model_ssi";

/// Searchable text field for a property: `<name>_tesim`.
#[must_use]
pub fn property_field(name: &str) -> String {
    format!("{}_tesim", name.to_case(Case::Snake))
}

///
/// IndexProfile
///
/// System metadata plus attribute values, serialized into [`PROFILE_FIELD`].
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexProfile {
    pub model: String,
    pub profile: ObjectProfile,
    pub attributes: BTreeMap<String, Value>,
}

impl IndexProfile {
    /// Profile carried by `document`. Absent or unreadable blobs yield `None`.
    #[must_use]
    pub fn from_document(document: &SolrDocument) -> Option<Self> {
        let blob = document.first(PROFILE_FIELD)?;

        match serde_json::from_str(blob) {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(id = ?document.id(), error = %err, "unreadable profile blob in index document");
                None
            }
        }
    }
}

impl Entity {
    /// Flatten into an index document. Requires an identifier and a profile.
    pub fn to_solr(&self, translator: &dyn UriTranslator) -> Result<SolrDocument, InternalError> {
        let (Some(pid), Some(profile)) = (&self.pid, &self.profile) else {
            return Err(InternalError::never_persisted("index", &self.describe()));
        };
        let subject = translator.id_to_uri(pid);

        let mut document = SolrDocument::new(pid.as_str());
        for triple in self.relationships.iter() {
            if triple.subject != subject {
                continue;
            }
            if let Term::Uri(uri) = &triple.object {
                document.push(relationship_field(&triple.predicate), uri.clone());
            }
        }
        document.set(MODEL_NAME_FIELD, self.model.name);

        for property in self.model.all_properties() {
            let Some(value) = self.attributes.get(property.name) else {
                continue;
            };
            for item in value.to_items() {
                if let Some(text) = item.render() {
                    document.push(property_field(property.name), text);
                }
            }
        }

        document.set(CREATED_FIELD, timestamp(profile.created)?);
        document.set(MODIFIED_FIELD, timestamp(profile.modified)?);

        let blob = IndexProfile {
            model: self.model.name.to_string(),
            profile: profile.clone(),
            attributes: self
                .attributes
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        };
        let json = serde_json::to_string(&blob).map_err(|err| {
            InternalError::persistence_invariant(format!(
                "failed to serialize profile for {}: {err}",
                self.describe()
            ))
        })?;
        document.set(PROFILE_FIELD, json);

        Ok(document)
    }

    /// Partially hydrated entity built from an index profile blob.
    ///
    /// Attributes the model doesn't declare, or that don't conform, are
    /// skipped; hydration from storage fills them in.
    pub(crate) fn from_index_profile(
        model: &'static EntityModel,
        pid: Pid,
        blob: IndexProfile,
    ) -> Self {
        let mut entity = Self::new(model);

        for (name, value) in blob.attributes {
            let Some(attribute) = model.attribute(&name) else {
                continue;
            };
            match conform(model, attribute, value) {
                Ok(value) => {
                    entity.attributes.insert(attribute.name(), value);
                }
                Err(err) => warn!(%pid, attribute = %name, error = %err, "skipping profile attribute"),
            }
        }

        entity.pid = Some(pid);
        entity.state = EntityState::Persisted;
        entity.profile = Some(blob.profile);
        entity.hydration = Hydration::Partial;

        entity
    }
}

fn timestamp(at: OffsetDateTime) -> Result<String, InternalError> {
    at.format(&Rfc3339).map_err(|err| {
        InternalError::persistence_invariant(format!("failed to format timestamp: {err}"))
    })
}
