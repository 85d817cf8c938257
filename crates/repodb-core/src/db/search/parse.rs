//! Recursive-descent reader for the query grammar produced by `query`.
//!
//! ```text
//! expr   := and ("OR" and)*
//! and    := atom ("AND" atom)*
//! atom   := "(" expr ")" | "*:*" | "_query_:" QUOTED | FIELD ":" value
//! value  := QUOTED | "*" | BARE
//! ```
//!
//! `_query_` strings carry local params: `{!raw f=<field>}<value>` or
//! `{!field f=<field>}<value>`.

use crate::db::search::SolrDocument;
use thiserror::Error as ThisError;

///
/// QueryParseError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryParseError {
    #[error("empty query")]
    Empty,

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected '{found}' at {position}, expected {expected}")]
    UnexpectedChar {
        position: usize,
        found: char,
        expected: &'static str,
    },

    #[error("malformed local params '{params}'")]
    MalformedLocalParams { params: String },

    #[error("unknown local query parser '{name}'")]
    UnknownLocalParser { name: String },
}

///
/// QueryNode
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryNode {
    All,
    /// Any value of `field` equals `value`.
    Term { field: String, value: String },
    /// `field` is present with at least one value.
    Exists { field: String },
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl QueryNode {
    #[must_use]
    pub fn matches(&self, doc: &SolrDocument) -> bool {
        match self {
            Self::All => true,
            Self::Term { field, value } => doc.values(field).contains(&value.as_str()),
            Self::Exists { field } => !doc.values(field).is_empty(),
            Self::And(nodes) => nodes.iter().all(|n| n.matches(doc)),
            Self::Or(nodes) => nodes.iter().any(|n| n.matches(doc)),
        }
    }
}

/// Parse a query string into a [`QueryNode`] tree.
pub fn parse_query(input: &str) -> Result<QueryNode, QueryParseError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };

    parser.skip_ws();
    if parser.at_end() {
        return Err(QueryParseError::Empty);
    }

    let node = parser.expr()?;
    parser.skip_ws();
    if let Some(found) = parser.peek() {
        return Err(QueryParseError::UnexpectedChar {
            position: parser.pos,
            found,
            expected: "end of query",
        });
    }

    Ok(node)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn expr(&mut self) -> Result<QueryNode, QueryParseError> {
        let mut nodes = vec![self.and()?];
        while self.keyword("OR") {
            nodes.push(self.and()?);
        }

        Ok(collapse(nodes, QueryNode::Or))
    }

    fn and(&mut self) -> Result<QueryNode, QueryParseError> {
        let mut nodes = vec![self.atom()?];
        while self.keyword("AND") {
            nodes.push(self.atom()?);
        }

        Ok(collapse(nodes, QueryNode::And))
    }

    fn atom(&mut self) -> Result<QueryNode, QueryParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(QueryParseError::UnexpectedEnd { expected: "clause" }),
            Some('(') => {
                self.pos += 1;
                let node = self.expr()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(node)
            }
            Some('*') => {
                self.pos += 1;
                self.expect(':')?;
                self.expect('*')?;
                Ok(QueryNode::All)
            }
            Some(_) => {
                let field = self.field()?;
                self.expect(':')?;
                if field == "_query_" {
                    let local = self.quoted()?;
                    return local_params(&local);
                }

                match self.peek() {
                    Some('"') => Ok(QueryNode::Term {
                        field,
                        value: self.quoted()?,
                    }),
                    Some('*') if self.is_bare_star() => {
                        self.pos += 1;
                        Ok(QueryNode::Exists { field })
                    }
                    _ => Ok(QueryNode::Term {
                        field,
                        value: self.bare()?,
                    }),
                }
            }
        }
    }

    fn field(&mut self) -> Result<String, QueryParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.') {
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.pos == start {
            return match self.peek() {
                Some(found) => Err(QueryParseError::UnexpectedChar {
                    position: self.pos,
                    found,
                    expected: "field name",
                }),
                None => Err(QueryParseError::UnexpectedEnd {
                    expected: "field name",
                }),
            };
        }

        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self) -> Result<String, QueryParseError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(QueryParseError::UnexpectedEnd { expected: "'\"'" }),
                Some('"') => return Ok(out),
                Some('\\') => match self.advance() {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(QueryParseError::UnexpectedEnd {
                            expected: "escaped character",
                        });
                    }
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn bare(&mut self) -> Result<String, QueryParseError> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == ')' {
                break;
            }
            self.pos += 1;
            if ch == '\\' {
                match self.advance() {
                    Some(escaped) => out.push(escaped),
                    None => {
                        return Err(QueryParseError::UnexpectedEnd {
                            expected: "escaped character",
                        });
                    }
                }
            } else {
                out.push(ch);
            }
        }

        if out.is_empty() {
            return Err(QueryParseError::UnexpectedEnd { expected: "value" });
        }

        Ok(out)
    }

    fn is_bare_star(&self) -> bool {
        self.chars
            .get(self.pos + 1)
            .is_none_or(|ch| ch.is_whitespace() || *ch == ')')
    }

    // Consume `word` when it appears as a standalone keyword.
    fn keyword(&mut self, word: &str) -> bool {
        let save = self.pos;
        self.skip_ws();
        let len = word.chars().count();
        let matches = self
            .chars
            .get(self.pos..self.pos + len)
            .is_some_and(|s| s.iter().copied().eq(word.chars()));
        let bounded = self
            .chars
            .get(self.pos + len)
            .is_some_and(|ch| ch.is_whitespace() || *ch == '(');

        if matches && bounded {
            self.pos += len;
            true
        } else {
            self.pos = save;
            false
        }
    }

    fn expect(&mut self, want: char) -> Result<(), QueryParseError> {
        match self.peek() {
            Some(ch) if ch == want => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(QueryParseError::UnexpectedChar {
                position: self.pos,
                found,
                expected: expected_label(want),
            }),
            None => Err(QueryParseError::UnexpectedEnd {
                expected: expected_label(want),
            }),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;

        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

const fn expected_label(ch: char) -> &'static str {
    match ch {
        ')' => "')'",
        ':' => "':'",
        '"' => "'\"'",
        '*' => "'*'",
        _ => "token",
    }
}

fn collapse(mut nodes: Vec<QueryNode>, wrap: fn(Vec<QueryNode>) -> QueryNode) -> QueryNode {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        wrap(nodes)
    }
}

// `{!raw f=<field>}<value>` or `{!field f=<field>}<value>`
fn local_params(local: &str) -> Result<QueryNode, QueryParseError> {
    let malformed = || QueryParseError::MalformedLocalParams {
        params: local.to_string(),
    };

    let rest = local.strip_prefix("{!").ok_or_else(malformed)?;
    let (params, value) = rest.split_once('}').ok_or_else(malformed)?;
    let (name, field) = params.split_once(' ').ok_or_else(malformed)?;
    let field = field.trim().strip_prefix("f=").ok_or_else(malformed)?;
    if field.is_empty() {
        return Err(malformed());
    }

    match name {
        "raw" | "field" | "term" => Ok(QueryNode::Term {
            field: field.to_string(),
            value: value.to_string(),
        }),
        other => Err(QueryParseError::UnknownLocalParser {
            name: other.to_string(),
        }),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn term(field: &str, value: &str) -> QueryNode {
        QueryNode::Term {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let node = parse_query("a:1 OR b:2 AND c:3").unwrap();

        assert_eq!(
            node,
            QueryNode::Or(vec![
                term("a", "1"),
                QueryNode::And(vec![term("b", "2"), term("c", "3")]),
            ])
        );
    }

    #[test]
    fn local_params_unescape_quoted_value() {
        let node = parse_query(r#"_query_:"{!raw f=id}a\"b""#).unwrap();

        assert_eq!(node, term("id", "a\"b"));
    }

    #[test]
    fn bare_values_unescape_backslashes() {
        let node = parse_query(r"title_tesim:a\:b\ c").unwrap();

        assert_eq!(node, term("title_tesim", "a:b c"));
    }

    #[test]
    fn match_all_and_exists() {
        assert_eq!(parse_query("*:*").unwrap(), QueryNode::All);
        assert_eq!(
            parse_query("title_tesim:*").unwrap(),
            QueryNode::Exists {
                field: "title_tesim".to_string()
            }
        );
    }

    #[test]
    fn unbalanced_parenthesis_is_rejected() {
        let err = parse_query("(a:1 AND b:2").unwrap_err();

        assert_eq!(err, QueryParseError::UnexpectedEnd { expected: "')'" });
    }

    #[test]
    fn unknown_local_parser_is_rejected() {
        let err = parse_query(r#"_query_:"{!lucene f=id}x""#).unwrap_err();

        assert!(matches!(err, QueryParseError::UnknownLocalParser { .. }));
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(parse_query("   ").unwrap_err(), QueryParseError::Empty);
    }
}
