//! Query-string builders.
//!
//! Values are escaped before interpolation; builders never produce a clause
//! the parser in `parse` cannot read back.

use crate::{
    db::search::{HAS_MODEL_FIELD, ID_FIELD},
    types::Pid,
};
use convert_case::{Case, Casing};

/// Clause used for an empty id list; matches nothing.
pub const NEVER_USE_THIS_ID: &str = "id:NEVER_USE_THIS_ID";

/// Match-everything clause.
pub const MATCH_ALL: &str = "*:*";

///
/// Join
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Join {
    And,
    Or,
}

impl Join {
    #[must_use]
    pub const fn separator(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Escape a value for interpolation inside a quoted `_query_` string.
#[must_use]
pub fn escape_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }

    out
}

/// Escape a bare `field:value` term.
#[must_use]
pub fn escape_term(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if is_term_special(ch) {
            out.push('\\');
        }
        out.push(ch);
    }

    out
}

pub(crate) const fn is_term_special(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '+'
            | '-'
            | '&'
            | '|'
            | '!'
            | '('
            | ')'
            | '{'
            | '}'
            | '['
            | ']'
            | '^'
            | '"'
            | '~'
            | '*'
            | '?'
            | ':'
            | '/'
            | ' '
            | '\t'
            | '\n'
    )
}

/// `_query_:"{!raw f=<field>}<value>"`; exact, unanalyzed match.
#[must_use]
pub fn raw_query(field: &str, value: &str) -> String {
    format!(
        "_query_:\"{}\"",
        escape_quoted(&format!("{{!raw f={field}}}{value}"))
    )
}

/// `_query_:"{!field f=<field>}<value>"`.
#[must_use]
pub fn field_query(field: &str, value: &str) -> String {
    format!(
        "_query_:\"{}\"",
        escape_quoted(&format!("{{!field f={field}}}{value}"))
    )
}

/// `<field>:<escaped value>`.
#[must_use]
pub fn term_query(field: &str, value: &str) -> String {
    format!("{field}:{}", escape_term(value))
}

/// One raw id clause per identifier, OR-joined.
#[must_use]
pub fn construct_query_for_ids(ids: &[Pid]) -> String {
    if ids.is_empty() {
        return NEVER_USE_THIS_ID.to_string();
    }

    ids.iter()
        .map(|id| raw_query(ID_FIELD, id.as_str()))
        .collect::<Vec<_>>()
        .join(Join::Or.separator())
}

/// One field clause per `(field, value)` pair.
#[must_use]
pub fn construct_query_for_rel(pairs: &[(&str, &str)], join: Join) -> String {
    pairs
        .iter()
        .map(|(field, value)| field_query(field, value))
        .collect::<Vec<_>>()
        .join(join.separator())
}

/// OR of type-assertion clauses over the given class URIs.
#[must_use]
pub fn has_model_query(class_uris: &[String]) -> String {
    let pairs: Vec<(&str, &str)> = class_uris
        .iter()
        .map(|uri| (HAS_MODEL_FIELD, uri.as_str()))
        .collect();

    construct_query_for_rel(&pairs, Join::Or)
}

/// Parenthesize each non-empty clause and join them.
#[must_use]
pub fn group(clauses: &[String], join: Join) -> String {
    let parts: Vec<String> = clauses
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| format!("({c})"))
        .collect();

    match parts.len() {
        0 => String::new(),
        1 => clauses
            .iter()
            .find(|c| !c.is_empty())
            .cloned()
            .unwrap_or_default(),
        _ => parts.join(join.separator()),
    }
}

/// Index field holding the object URIs asserted under `predicate`:
/// the snake-cased local name plus `_ssim`.
#[must_use]
pub fn relationship_field(predicate: &str) -> String {
    let local = predicate
        .rsplit(['#', '/'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(predicate);

    format!("{}_ssim", local.to_case(Case::Snake))
}

///
/// TESTS
///
