//! EQL parsing: lexer, grammar, and placeholder preparation.
//!
//! ```text
//!  #       +-----------+------------------------------------> key selection
//!  #       |           |                 +------------------> source
//!  #       |           |                 |           +------> condition key
//!  #       v           v                 v           v
//!  LOOKUP word.word, word.flat WITHIN word_letters.letter == "a"
//!  OFFSET 10 LIMIT 10
//! ```

pub mod grammar;
pub mod prepare;
pub mod tokens;

pub use prepare::prepare_syntax;

use serde_json::json;

use crate::ast::Syntax;
use crate::error::{Pos, SyntaxCause, SyntaxError};

/// Parse an EQL statement into a validated [`Syntax`] tree.
pub fn parse(input: &str) -> Result<Syntax, SyntaxError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SyntaxError::new(Pos::default(), SyntaxCause::EmptyInput));
    }
    let toks = tokens::lex(trimmed)?;
    grammar::parse_tokens(&toks)
}

/// The EQL grammar in informal EBNF.
pub const SYNTAX_EBNF: &str = r#"Syntax   = ( ( "LOOKUP" "COUNT"? "DISTINCT"? Key ( "," Key )* ) | "QUERY" )
           ( "WITHIN" Expr )?
           ( "ORDER" "BY" ( Ref ( "," Ref )* | "RANDOM" "(" ")" ) ( "ASC" | "DESC" | "DSC" )? )?
           ( "OFFSET" Int )? ( "LIMIT" Int )? ";"? .
Key      = Ident? "." Ident ( "AS" Ident )? .
Ref      = ( Ident? "." Ident ) | Ident .
Expr     = Constraint | "(" Expr ")" ( "AND" | "OR" ) "(" Expr ")" .
Constraint = Ref ( Op Value | "NOT"? "IN" "(" Value ( "," Value )* ")" ) .
Op       = "==" | "!=" | "<>" | ">=" | "<=" | ">" | "<"
         | ( "NOT" | "!" )? ( "LIKE" | "^=" | "$=" | "*=" | "~=" ) .
Value    = String | Int | Float | "TRUE" | "FALSE" | "NIL" | "NULL" | Ref | Placeholder .
Placeholder = "{" Int "}" .
"#;

/// A JSON description of the lexer's token classes, mirroring the order
/// rules are attempted in.
pub fn lexer_json() -> serde_json::Value {
    json!([
        { "name": "Placeholder", "pattern": "\\{\\d+\\}" },
        { "name": "Float", "pattern": "\\d*\\.\\d+" },
        { "name": "Int", "pattern": "\\d+" },
        { "name": "String", "pattern": "'(?:\\\\'|[^'])*'|\"(?:\\\\\"|[^\"])*\"|`(?:\\\\`|[^`])*`" },
        { "name": "Operator", "pattern": "==|!=|<>|>=|<=|\\^=|\\$=|~=|\\*=|<|>" },
        { "name": "Keyword", "pattern": "(?i)LOOKUP|QUERY|COUNT|DISTINCT|WITHIN|ORDER|BY|RANDOM|OFFSET|LIMIT|ASC|DESC|DSC|LIKE|NOT|AND|OR|IN|AS|TRUE|FALSE|NIL|NULL" },
        { "name": "Ident", "pattern": "[_A-Za-z][_A-Za-z0-9]*" },
        { "name": "Punctuation", "pattern": "[.,;!()]" },
        { "name": "whitespace", "pattern": "\\s+" },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ConstraintTest, Expression, Operator, Value};

    fn round_trip(input: &str) -> String {
        let parsed = parse(input).unwrap();
        let rendered = parsed.to_string();
        let again = parse(&rendered).unwrap();
        assert_eq!(rendered, again.to_string(), "unstable rendering: {input}");
        rendered
    }

    #[test]
    fn parses_basic_lookup() {
        let s = parse("LOOKUP .ID, .Shasum ORDER BY .ID").unwrap();
        assert!(s.lookup);
        assert_eq!(s.keys.len(), 2);
        assert_eq!(s.keys[0].key, "ID");
        assert!(s.order_by.is_some());
    }

    #[test]
    fn parses_query() {
        let s = parse("query").unwrap();
        assert!(s.query);
        assert!(s.keys.is_empty());
    }

    #[test]
    fn keywords_any_case() {
        let s = parse("lookup .id within .Language == 'ja'").unwrap();
        assert!(s.lookup);
        let within = s.within.unwrap();
        match within {
            Expression::Constraint(c) => match c.test {
                ConstraintTest::Compare { op, right } => {
                    assert_eq!(op, Operator::Eq);
                    assert_eq!(right, Value::Text("ja".into()));
                }
                _ => panic!("expected compare"),
            },
            _ => panic!("expected constraint"),
        }
    }

    #[test]
    fn parses_negated_string_ops() {
        let s = parse("lookup .id within .Type not ~= \"page blog\"").unwrap();
        match s.within.unwrap() {
            Expression::Constraint(c) => match c.test {
                ConstraintTest::Compare { op, .. } => {
                    assert_eq!(op, Operator::ContainsField { not: true });
                }
                _ => panic!(),
            },
            _ => panic!(),
        }

        let s = parse("lookup .id within .Url !^= '/x/'").unwrap();
        match s.within.unwrap() {
            Expression::Constraint(c) => match c.test {
                ConstraintTest::Compare { op, .. } => {
                    assert_eq!(op, Operator::StartsWith { not: true });
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn parses_in_lists() {
        let s = parse("lookup .id within .language IN ('en', 'ja')").unwrap();
        match s.within.unwrap() {
            Expression::Constraint(c) => match c.test {
                ConstraintTest::In { not, values } => {
                    assert!(!not);
                    assert_eq!(values.len(), 2);
                }
                _ => panic!(),
            },
            _ => panic!(),
        }

        let err = parse("lookup .id within .language IN ()").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::InvalidInOp);
    }

    #[test]
    fn parses_nested_conditions() {
        let s = parse(
            "LOOKUP .id WITHIN ((.a == 1) AND (.b != 2)) OR (word.c >= 3.5) ORDER BY .id, word.c DESC OFFSET 5 LIMIT 10;",
        )
        .unwrap();
        assert!(s.within.is_some());
        assert_eq!(s.offset, Some(5));
        assert_eq!(s.limit, Some(10));
        assert!(s.semicolon);
    }

    #[test]
    fn parses_aliases() {
        let s = parse("LOOKUP .shasum AS sum WITHIN sum ^= 'abc'").unwrap();
        assert_eq!(s.keys[0].alias.as_deref(), Some("sum"));
        match s.within.unwrap() {
            Expression::Constraint(c) => {
                assert_eq!(c.left.alias.as_deref(), Some("sum"));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn string_renderings_reparse() {
        for input in [
            "LOOKUP .id, .shasum;",
            "LOOKUP COUNT .id",
            "LOOKUP DISTINCT word.word",
            "LOOKUP COUNT DISTINCT word.word",
            "lookup .id within .Language == 'ja'",
            "lookup .id within .Url ^= \"/pages/\"",
            "lookup .id within .Type not ~= \"page blog\"",
            "LOOKUP .id WITHIN (.a == 1) AND (.b IN (1, 2, 3))",
            "QUERY WITHIN .language != 'en' ORDER BY RANDOM()",
            "LOOKUP .id ORDER BY .id, .shasum DSC OFFSET 1 LIMIT 2;",
            "LOOKUP .shasum AS sum WITHIN sum == {1}",
            "QUERY WITHIN .updated <= NULL",
        ] {
            round_trip(input);
        }
    }

    #[test]
    fn lookup_without_keys_rejected() {
        let err = parse("LOOKUP").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MismatchLookup);
        let err = parse("LOOKUP WITHIN .a == 1").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MismatchLookup);
    }

    #[test]
    fn query_with_keys_rejected() {
        let err = parse("QUERY .id").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MismatchQuery);
    }

    #[test]
    fn count_needs_exactly_one_key() {
        assert!(parse("LOOKUP COUNT .id").is_ok());
        let err = parse("LOOKUP COUNT .id, .shasum").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::CountRequiresOneKey);
    }

    #[test]
    fn missing_pieces_report_positions() {
        let err = parse("LOOKUP .id WITHIN .a ==").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MissingRightSide);
        assert_eq!(err.pos.line, 1);

        let err = parse("LOOKUP .id WITHIN == 1").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MissingLeftSide);

        let err = parse("LOOKUP .id WITHIN .a 1").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::MissingOperator);
    }

    #[test]
    fn trailing_junk_rejected() {
        let err = parse("QUERY LIMIT 1 nonsense").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::Unexpected("nonsense".into()));
    }

    #[test]
    fn empty_input_rejected() {
        let err = parse("   ").unwrap_err();
        assert_eq!(err.cause, SyntaxCause::EmptyInput);
    }

    #[test]
    fn ebnf_mentions_every_keyword() {
        for kw in ["LOOKUP", "QUERY", "WITHIN", "ORDER", "RANDOM", "OFFSET", "LIMIT"] {
            assert!(SYNTAX_EBNF.contains(kw), "missing {kw}");
        }
    }
}
