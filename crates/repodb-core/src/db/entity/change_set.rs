use crate::{
    model::{AttributeDef, EntityModel},
    rdf::{Graph, Literal, Term, Triple},
    types::{Pid, UriTranslator},
    value::Value,
};

///
/// ChangeSet
///
/// Changed attributes rendered as replacement statements: each predicate's
/// existing statements about the subject are removed and the new objects
/// inserted.
///

#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<(&'static str, Vec<Term>)>,
}

impl ChangeSet {
    pub(crate) fn build<'a>(
        model: &'static EntityModel,
        changed: impl IntoIterator<Item = (&'static str, &'a Value)>,
        translator: &dyn UriTranslator,
    ) -> Self {
        let mut changes = Vec::new();
        for (name, value) in changed {
            let Some(attribute) = model.attribute(name) else {
                continue;
            };
            changes.push((attribute.predicate(), terms(attribute, value, translator)));
        }

        Self { changes }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn predicates(&self) -> Vec<&'static str> {
        self.changes.iter().map(|(p, _)| *p).collect()
    }

    /// Apply every replacement to `graph` for `subject`.
    pub fn apply(&self, graph: &mut Graph, subject: &str) {
        for (predicate, objects) in &self.changes {
            graph.remove_matching(subject, predicate);
            for object in objects {
                graph.insert(Triple::new(subject, *predicate, object.clone()));
            }
        }
    }
}

fn terms(attribute: AttributeDef, value: &Value, translator: &dyn UriTranslator) -> Vec<Term> {
    value
        .to_items()
        .iter()
        .filter_map(|item| match attribute {
            AttributeDef::ForeignKey(_) => item
                .as_text()
                .filter(|text| !text.is_empty())
                .map(|id| Term::Uri(translator.id_to_uri(&Pid::new(id)))),
            AttributeDef::Property(_) => literal(item).map(Term::Literal),
        })
        .collect()
}

fn literal(value: &Value) -> Option<Literal> {
    match value {
        Value::Text(text) => Some(Literal::String(text.clone())),
        Value::Int(int) => Some(Literal::Integer(*int)),
        Value::Bool(flag) => Some(Literal::Boolean(*flag)),
        Value::Null | Value::List(_) => None,
    }
}
