//! Tag set expressions.
//!
//! ```text
//! expr    := operand (op operand)*
//! operand := tag | '(' expr ')'
//! op      := '+' (union) | '*' (intersection) | '-' (difference)
//! ```
//!
//! All operators share one precedence level and associate to the left, so
//! `a - b + c` is `(a - b) + c`. Tag names are bare words or quoted with `'`
//! or `"`; outside quotes whitespace is dropped, so `my tag` names `mytag`.

use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::tag_index::TagIndex;
use crate::types::{MediaId, TagId};

/// Media matched by a query and the tags it referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub media_ids: BTreeSet<MediaId>,
    pub tag_ids: BTreeSet<TagId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Union,
    Intersect,
    Difference,
}

impl Operator {
    fn symbol(self) -> char {
        match self {
            Self::Union => '+',
            Self::Intersect => '*',
            Self::Difference => '-',
        }
    }

    fn apply(self, left: BTreeSet<MediaId>, right: BTreeSet<MediaId>) -> BTreeSet<MediaId> {
        match self {
            Self::Union => {
                let (mut big, small) = if left.len() >= right.len() { (left, right) } else { (right, left) };
                big.extend(small);
                big
            }
            Self::Intersect => left.intersection(&right).copied().collect(),
            Self::Difference => left.difference(&right).copied().collect(),
        }
    }
}

#[derive(Debug)]
enum Token {
    Tag(BTreeSet<MediaId>),
    Op(Operator),
    Open,
    Close,
}

#[derive(Debug)]
enum Node {
    Leaf(BTreeSet<MediaId>),
    Binary {
        op: Operator,
        left: Box<Node>,
        right: Option<Box<Node>>,
    },
}

impl Node {
    fn awaiting_operand(&self) -> bool {
        matches!(self, Node::Binary { right: None, .. })
    }

    /// Post-order; children are consumed as soon as their parent combines them.
    fn evaluate(self) -> BTreeSet<MediaId> {
        match self {
            Node::Leaf(set) => set,
            Node::Binary { op, left, right } => {
                let left = left.evaluate();
                let right = right.map(|node| node.evaluate()).unwrap_or_default();
                op.apply(left, right)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct QueryEngine;

impl QueryEngine {
    /// Evaluate `query` against the live tags of `tags`.
    pub fn run(query: &str, tags: &TagIndex) -> Result<QueryResult, QueryError> {
        Self::evaluate(query, |name| {
            tags.get_by_name(name).map(|tag| (tag.id, tag.media_ids.clone()))
        })
    }

    /// Evaluate `query`, resolving every tag name through `lookup`.
    ///
    /// An unknown name fails the whole query. No partial result is produced
    /// on any error.
    pub fn evaluate<F>(query: &str, lookup: F) -> Result<QueryResult, QueryError>
    where
        F: FnMut(&str) -> Option<(TagId, BTreeSet<MediaId>)>,
    {
        let (tokens, tag_ids) = tokenize(query, lookup)?;
        let mut tokens = tokens.into_iter();
        let root = build(&mut tokens, false)?;
        Ok(QueryResult {
            media_ids: root.evaluate(),
            tag_ids,
        })
    }
}

fn tokenize<F>(query: &str, mut lookup: F) -> Result<(Vec<Token>, BTreeSet<TagId>), QueryError>
where
    F: FnMut(&str) -> Option<(TagId, BTreeSet<MediaId>)>,
{
    let mut tokens = Vec::new();
    let mut tag_ids = BTreeSet::new();
    let mut name = String::new();
    let mut quoted = false;
    let mut depth = 0usize;

    let mut flush = |name: &mut String, tokens: &mut Vec<Token>| -> Result<(), QueryError> {
        if name.is_empty() {
            return Ok(());
        }
        let (id, media) = lookup(name.as_str()).ok_or_else(|| QueryError::UnknownTag(name.clone()))?;
        tag_ids.insert(id);
        tokens.push(Token::Tag(media));
        name.clear();
        Ok(())
    };

    for ch in query.chars() {
        if ch == '\'' || ch == '"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            name.push(ch);
            continue;
        }
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Op(Operator::Union),
            '*' => Token::Op(Operator::Intersect),
            '-' => Token::Op(Operator::Difference),
            '(' => {
                depth += 1;
                Token::Open
            }
            ')' => {
                if depth == 0 {
                    return Err(QueryError::Syntax("unmatched ')'".into()));
                }
                depth -= 1;
                Token::Close
            }
            other => {
                name.push(other);
                continue;
            }
        };
        flush(&mut name, &mut tokens)?;
        tokens.push(token);
    }

    if quoted {
        return Err(QueryError::Syntax("unterminated quote".into()));
    }
    flush(&mut name, &mut tokens)?;
    if depth > 0 {
        return Err(QueryError::Syntax("unmatched '('".into()));
    }
    Ok((tokens, tag_ids))
}

/// Single left-to-right pass: an operator becomes the new root with the old
/// root on its left; the next operand (or parenthesised group) fills its
/// right side.
fn build(tokens: &mut impl Iterator<Item = Token>, in_group: bool) -> Result<Node, QueryError> {
    let mut root: Option<Node> = None;

    while let Some(token) = tokens.next() {
        let operand = match token {
            Token::Close if in_group => break,
            Token::Close => return Err(QueryError::Syntax("unmatched ')'".into())),
            Token::Op(op) => {
                root = match root {
                    Some(left) if !left.awaiting_operand() => Some(Node::Binary {
                        op,
                        left: Box::new(left),
                        right: None,
                    }),
                    _ => {
                        return Err(QueryError::Syntax(format!(
                            "operator '{}' is missing its left operand",
                            op.symbol()
                        )))
                    }
                };
                continue;
            }
            Token::Tag(media) => Node::Leaf(media),
            Token::Open => build(tokens, true)?,
        };

        root = match root {
            None => Some(operand),
            Some(Node::Binary { op, left, right: None }) => Some(Node::Binary {
                op,
                left,
                right: Some(Box::new(operand)),
            }),
            Some(_) => return Err(QueryError::Syntax("missing operator between operands".into())),
        };
    }

    match root {
        None if in_group => Err(QueryError::Syntax("empty parentheses".into())),
        None => Err(QueryError::Syntax("empty query".into())),
        Some(Node::Binary { op, right: None, .. }) => Err(QueryError::Syntax(format!(
            "operator '{}' is missing its right operand",
            op.symbol()
        ))),
        Some(node) => Ok(node),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ids(raw: &[u32]) -> BTreeSet<MediaId> {
        raw.iter().copied().map(MediaId).collect()
    }

    /// a={1,2}  b={2,3}  c={2}  d={4}  "x y"={5}  "a+b"={6}
    fn fixture() -> TagIndex {
        let mut tags = TagIndex::new();
        for (name, media) in [
            ("a", &[1u32, 2][..]),
            ("b", &[2, 3]),
            ("c", &[2]),
            ("d", &[4]),
            ("x y", &[5]),
            ("a+b", &[6]),
        ] {
            let id = tags.insert_new(name);
            for m in media {
                tags.link(id, MediaId(*m));
            }
        }
        tags
    }

    #[rstest]
    #[case("a", &[1, 2])]
    #[case("a + b", &[1, 2, 3])]
    #[case("a * b", &[2])]
    #[case("a - b", &[1])]
    #[case("a + b - c", &[1, 3])]
    #[case("a - b + c", &[1, 2])]
    #[case("a - (b + c)", &[1])]
    #[case("(a + d) * (b + d)", &[2, 4])]
    #[case("((a))", &[1, 2])]
    #[case("  a+b  *c ", &[2])]
    #[case("'x y' + d", &[4, 5])]
    #[case("\"a+b\"", &[6])]
    #[case("d * c", &[])]
    fn evaluates_left_to_right(#[case] query: &str, #[case] expected: &[u32]) {
        let result = QueryEngine::run(query, &fixture()).expect("query evaluates");
        assert_eq!(result.media_ids, ids(expected));
    }

    #[rstest]
    #[case("a + (b")]
    #[case("a + b)")]
    #[case(")a(")]
    #[case("")]
    #[case("   ")]
    #[case("a +")]
    #[case("+ a")]
    #[case("a + * b")]
    #[case("a (b)")]
    #[case("()")]
    #[case("'a")]
    fn malformed_queries_are_syntax_errors(#[case] query: &str) {
        let err = QueryEngine::run(query, &fixture()).expect_err("query must fail");
        assert!(matches!(err, QueryError::Syntax(_)), "{query:?} gave {err:?}");
    }

    #[test]
    fn unknown_tag_fails_whole_query() {
        let err = QueryEngine::run("a + nope", &fixture()).expect_err("unknown tag");
        assert_eq!(err, QueryError::UnknownTag("nope".into()));
    }

    #[test]
    fn whitespace_outside_quotes_is_dropped() {
        let err = QueryEngine::run("x y", &fixture()).expect_err("xy is not a tag");
        assert_eq!(err, QueryError::UnknownTag("xy".into()));
    }

    #[test]
    fn referenced_tags_are_reported() {
        let tags = fixture();
        let result = QueryEngine::run("c + a + c", &tags).expect("query evaluates");
        let expected: BTreeSet<TagId> = ["a", "c"]
            .iter()
            .filter_map(|name| tags.get_by_name(name).map(|t| t.id))
            .collect();
        assert_eq!(result.tag_ids, expected);
    }

    #[test]
    fn custom_lookup_is_consulted_per_name() {
        let mut seen = Vec::new();
        let result = QueryEngine::evaluate("p * q", |name| {
            seen.push(name.to_string());
            Some((TagId(seen.len() as u32), ids(&[1, 2])))
        })
        .expect("query evaluates");
        assert_eq!(seen, vec!["p", "q"]);
        assert_eq!(result.media_ids, ids(&[1, 2]));
    }
}
