//! The EQL lexer.
//!
//! Token recognizers are nom combinators; the driver loop tracks line and
//! column so every downstream failure can point at its position.

use std::collections::HashMap;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit0, digit1, one_of};
use nom::combinator::{map, map_res, recognize, verify};
use nom::sequence::{delimited, tuple};
use nom::IResult;
use once_cell::sync::Lazy;

use crate::error::{Pos, SyntaxCause, SyntaxError};

/// Case-insensitive reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Lookup,
    Query,
    Count,
    Distinct,
    Within,
    Order,
    By,
    Random,
    Offset,
    Limit,
    Asc,
    Desc,
    Dsc,
    Like,
    Not,
    And,
    Or,
    In,
    As,
    True,
    False,
    Nil,
    Null,
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    HashMap::from([
        ("LOOKUP", Keyword::Lookup),
        ("QUERY", Keyword::Query),
        ("COUNT", Keyword::Count),
        ("DISTINCT", Keyword::Distinct),
        ("WITHIN", Keyword::Within),
        ("ORDER", Keyword::Order),
        ("BY", Keyword::By),
        ("RANDOM", Keyword::Random),
        ("OFFSET", Keyword::Offset),
        ("LIMIT", Keyword::Limit),
        ("ASC", Keyword::Asc),
        ("DESC", Keyword::Desc),
        ("DSC", Keyword::Dsc),
        ("LIKE", Keyword::Like),
        ("NOT", Keyword::Not),
        ("AND", Keyword::And),
        ("OR", Keyword::Or),
        ("IN", Keyword::In),
        ("AS", Keyword::As),
        ("TRUE", Keyword::True),
        ("FALSE", Keyword::False),
        ("NIL", Keyword::Nil),
        ("NULL", Keyword::Null),
    ])
});

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `{N}` positional placeholder, 1-based.
    Placeholder(usize),
    Int(i64),
    Float(f64),
    /// String literal with escapes already decoded.
    Str(String),
    /// One of the comparison operator symbols.
    Op(&'static str),
    Punct(char),
    Keyword(Keyword),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub text: String,
}

fn placeholder(input: &str) -> IResult<&str, TokenKind> {
    map_res(delimited(char('{'), digit1, char('}')), |n: &str| {
        n.parse::<usize>().map(TokenKind::Placeholder)
    })(input)
}

fn float(input: &str) -> IResult<&str, TokenKind> {
    map_res(
        recognize(tuple((digit0, char('.'), digit1))),
        |n: &str| n.parse::<f64>().map(TokenKind::Float),
    )(input)
}

fn int(input: &str) -> IResult<&str, TokenKind> {
    map_res(digit1, |n: &str| n.parse::<i64>().map(TokenKind::Int))(input)
}

fn string_token(input: &str) -> IResult<&str, TokenKind> {
    let (rest, quote) = one_of("'\"`")(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, n)) if n == quote => out.push(quote),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, n)) => {
                    out.push('\\');
                    out.push(n);
                }
                None => break,
            }
        } else if c == quote {
            return Ok((&rest[i + c.len_utf8()..], TokenKind::Str(out)));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TakeUntil,
    )))
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    map(
        alt((
            tag("=="),
            tag("!="),
            tag("<>"),
            tag(">="),
            tag("<="),
            tag("^="),
            tag("$="),
            tag("~="),
            tag("*="),
            tag("<"),
            tag(">"),
        )),
        |sym: &str| {
            TokenKind::Op(match sym {
                "==" => "==",
                "!=" => "!=",
                "<>" => "<>",
                ">=" => ">=",
                "<=" => "<=",
                "^=" => "^=",
                "$=" => "$=",
                "~=" => "~=",
                "*=" => "*=",
                "<" => "<",
                _ => ">",
            })
        },
    )(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        verify(
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            |s: &str| !s.starts_with(|c: char| c.is_ascii_digit()),
        ),
        |ident: &str| match KEYWORDS.get(ident.to_ascii_uppercase().as_str()) {
            Some(kw) => TokenKind::Keyword(*kw),
            None => TokenKind::Ident(ident.to_string()),
        },
    )(input)
}

fn punct(input: &str) -> IResult<&str, TokenKind> {
    map(one_of(".,;!()"), TokenKind::Punct)(input)
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((placeholder, float, int, string_token, operator, word, punct))(input)
}

fn advance(line: &mut u32, col: &mut u32, consumed: &str) {
    for c in consumed.chars() {
        if c == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
    }
}

/// Tokenize an EQL statement. Whitespace separates tokens; anything
/// unrecognized fails with its position.
pub fn lex(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    let mut line = 1u32;
    let mut col = 1u32;

    while !rest.is_empty() {
        let trimmed = rest.trim_start();
        if trimmed.len() != rest.len() {
            let ws = &rest[..rest.len() - trimmed.len()];
            advance(&mut line, &mut col, ws);
            rest = trimmed;
            continue;
        }

        let pos = Pos::new(line, col);
        match token(rest) {
            Ok((next, kind)) => {
                let consumed = &rest[..rest.len() - next.len()];
                tokens.push(Token {
                    kind,
                    pos,
                    text: consumed.to_string(),
                });
                advance(&mut line, &mut col, consumed);
                rest = next;
            }
            Err(_) => {
                let c = rest.chars().next().unwrap_or('\0');
                return Err(SyntaxError::new(pos, SyntaxCause::Character(c)));
            }
        }
    }

    Ok(tokens)
}
