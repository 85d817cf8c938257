//! Module: rdf
//! Responsibility: in-memory RDF statements for metadata datastreams.
//! Does not own: serialization formats or vocabularies.
//!
//! Invariants:
//! - A graph is a set; inserting an existing statement is a no-op.
//! - Statement order is the canonical `Ord` of `Triple`, never insertion order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// Term
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Term {
    Uri(String),
    Literal(Literal),
}

impl Term {
    #[must_use]
    pub fn uri(value: impl Into<String>) -> Self {
        Self::Uri(value.into())
    }

    #[must_use]
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Self::Uri(uri) => Some(uri),
            Self::Literal(_) => None,
        }
    }

    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Uri(_) => None,
        }
    }
}

///
/// Literal
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Literal {
    String(String),
    Integer(i64),
    Boolean(bool),
}

///
/// Triple
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    #[must_use]
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

///
/// Graph
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Graph {
    statements: BTreeSet<Triple>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Insert a statement; returns false when it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.statements.insert(triple)
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.statements.remove(triple)
    }

    /// Remove every `(subject, predicate, *)` statement; returns the count removed.
    pub fn remove_matching(&mut self, subject: &str, predicate: &str) -> usize {
        let before = self.statements.len();
        self.statements
            .retain(|t| !(t.subject == subject && t.predicate == predicate));

        before - self.statements.len()
    }

    /// Objects of every `(subject, predicate, ?)` statement in canonical order.
    pub fn objects<'a>(
        &'a self,
        subject: &'a str,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.statements
            .iter()
            .filter(move |t| t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Distinct predicates asserted about `subject`.
    #[must_use]
    pub fn predicates(&self, subject: &str) -> BTreeSet<&str> {
        self.statements
            .iter()
            .filter(|t| t.subject == subject)
            .map(|t| t.predicate.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.statements.iter()
    }

    /// Rewrite every statement whose subject is `from` to use `to`.
    ///
    /// New objects build their graph against a placeholder subject until an
    /// identifier has been minted.
    pub fn rename_subject(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }

        let statements = std::mem::take(&mut self.statements);
        self.statements = statements
            .into_iter()
            .map(|mut t| {
                if t.subject == from {
                    t.subject = to.to_string();
                }
                t
            })
            .collect();
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}
