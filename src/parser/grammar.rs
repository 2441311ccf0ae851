//! The LL(1) grammar over the token stream.
//!
//! One token of lookahead separates `Ident '.'` (qualified key) from a bare
//! `Ident` alias reference; everything else is single-token dispatch.

use crate::ast::{
    Condition, Constraint, ConstraintTest, Direction, Expression, LogicalOp, Operator, OrderBy,
    SourceKey, SourceRef, Syntax, Value,
};
use crate::error::{Pos, SyntaxCause, SyntaxError};
use crate::parser::tokens::{Keyword, Token, TokenKind};

pub(crate) struct TokenParser<'t> {
    toks: &'t [Token],
    idx: usize,
}

impl<'t> TokenParser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.toks.get(self.idx)
    }

    fn peek2(&self) -> Option<&'t Token> {
        self.toks.get(self.idx + 1)
    }

    /// Position of the current token, or just past the last one.
    fn pos(&self) -> Pos {
        if let Some(tok) = self.peek() {
            return tok.pos;
        }
        match self.toks.last() {
            Some(tok) => Pos::new(tok.pos.line, tok.pos.col + tok.text.chars().count() as u32),
            None => Pos::default(),
        }
    }

    fn err(&self, cause: SyntaxCause) -> SyntaxError {
        SyntaxError::new(self.pos(), cause)
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Keyword(kw))
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.idx += 1;
            return true;
        }
        false
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Punct(c))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.idx += 1;
            return true;
        }
        false
    }

    fn expect_punct(&mut self, c: char, what: &'static str) -> Result<(), SyntaxError> {
        if self.eat_punct(c) {
            return Ok(());
        }
        Err(self.err(SyntaxCause::Expected(what)))
    }

    fn expect_ident(&mut self, cause: SyntaxCause) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => {
                let name = name.clone();
                self.idx += 1;
                Ok(name)
            }
            _ => Err(self.err(cause)),
        }
    }

    fn expect_int(&mut self) -> Result<i64, SyntaxError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Int(n),
                ..
            }) => {
                let n = *n;
                self.idx += 1;
                Ok(n)
            }
            _ => Err(self.err(SyntaxCause::Expected("integer"))),
        }
    }

    /// Whether the next tokens begin a `<source>?.<key>` form.
    fn at_key_start(&self) -> bool {
        if self.at_punct('.') {
            return true;
        }
        matches!(self.peek(), Some(t) if matches!(t.kind, TokenKind::Ident(_)))
            && matches!(self.peek2(), Some(t) if t.kind == TokenKind::Punct('.'))
    }

    fn parse_source_key(&mut self, first: bool) -> Result<SourceKey, SyntaxError> {
        let pos = self.pos();
        if !self.at_key_start() {
            let cause = if first {
                SyntaxCause::MismatchLookup
            } else {
                SyntaxCause::MissingSourceKey
            };
            return Err(SyntaxError::new(pos, cause));
        }

        let source = match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => {
                let name = name.clone();
                self.idx += 1;
                Some(name)
            }
            _ => None,
        };
        self.expect_punct('.', "'.'")?;
        let key = self.expect_ident(SyntaxCause::MissingSourceKey)?;
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident(SyntaxCause::NilStructure)?)
        } else {
            None
        };

        Ok(SourceKey {
            source,
            key,
            alias,
            pos,
        })
    }

    fn parse_source_ref(&mut self, missing: SyntaxCause) -> Result<SourceRef, SyntaxError> {
        let pos = self.pos();
        if self.eat_punct('.') {
            let key = self.expect_ident(SyntaxCause::MissingSourceKey)?;
            return Ok(SourceRef {
                source: None,
                key: Some(key),
                alias: None,
                pos,
            });
        }

        if let Some(Token {
            kind: TokenKind::Ident(name),
            ..
        }) = self.peek()
        {
            let name = name.clone();
            if matches!(self.peek2(), Some(t) if t.kind == TokenKind::Punct('.')) {
                self.idx += 2;
                let key = self.expect_ident(SyntaxCause::MissingSourceKey)?;
                return Ok(SourceRef {
                    source: Some(name),
                    key: Some(key),
                    alias: None,
                    pos,
                });
            }
            self.idx += 1;
            return Ok(SourceRef {
                source: None,
                key: None,
                alias: Some(name),
                pos,
            });
        }

        Err(SyntaxError::new(pos, missing))
    }

    fn parse_string_op(&mut self, not: bool) -> Result<Operator, SyntaxError> {
        if self.eat_keyword(Keyword::Like) {
            return Ok(Operator::Like { not });
        }
        let op = match self.peek() {
            Some(Token {
                kind: TokenKind::Op(sym),
                ..
            }) => match *sym {
                "^=" => Some(Operator::StartsWith { not }),
                "$=" => Some(Operator::EndsWith { not }),
                "*=" => Some(Operator::Contains { not }),
                "~=" => Some(Operator::ContainsField { not }),
                _ => None,
            },
            _ => None,
        };
        match op {
            Some(op) => {
                self.idx += 1;
                Ok(op)
            }
            None => Err(self.err(SyntaxCause::MissingOperator)),
        }
    }

    fn parse_value(&mut self, missing: SyntaxCause) -> Result<Value, SyntaxError> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => {
                let s = s.clone();
                self.idx += 1;
                Ok(Value::Text(s))
            }
            Some(TokenKind::Int(n)) => {
                let n = *n;
                self.idx += 1;
                Ok(Value::Int(n))
            }
            Some(TokenKind::Float(f)) => {
                let f = *f;
                self.idx += 1;
                Ok(Value::Float(f))
            }
            Some(TokenKind::Placeholder(n)) => {
                let n = *n;
                self.idx += 1;
                Ok(Value::Placeholder(n))
            }
            Some(TokenKind::Keyword(Keyword::True)) => {
                self.idx += 1;
                Ok(Value::Bool(true))
            }
            Some(TokenKind::Keyword(Keyword::False)) => {
                self.idx += 1;
                Ok(Value::Bool(false))
            }
            Some(TokenKind::Keyword(Keyword::Nil)) | Some(TokenKind::Keyword(Keyword::Null)) => {
                self.idx += 1;
                Ok(Value::Null)
            }
            Some(TokenKind::Punct('.')) | Some(TokenKind::Ident(_)) => {
                Ok(Value::Ref(self.parse_source_ref(missing)?))
            }
            _ => Err(self.err(missing)),
        }
    }

    fn parse_constraint(&mut self) -> Result<Constraint, SyntaxError> {
        let pos = self.pos();
        let left = self.parse_source_ref(SyntaxCause::MissingLeftSide)?;

        let test = if self.eat_keyword(Keyword::In) {
            self.parse_in_values(false)?
        } else if self.eat_keyword(Keyword::Not) {
            if self.eat_keyword(Keyword::In) {
                self.parse_in_values(true)?
            } else {
                let op = self.parse_string_op(true)?;
                let right = self.parse_value(SyntaxCause::MissingRightSide)?;
                ConstraintTest::Compare { op, right }
            }
        } else if self.eat_punct('!') {
            let op = self.parse_string_op(true)?;
            let right = self.parse_value(SyntaxCause::MissingRightSide)?;
            ConstraintTest::Compare { op, right }
        } else if self.eat_keyword(Keyword::Like) {
            let right = self.parse_value(SyntaxCause::MissingRightSide)?;
            ConstraintTest::Compare {
                op: Operator::Like { not: false },
                right,
            }
        } else if let Some(Token {
            kind: TokenKind::Op(sym),
            ..
        }) = self.peek()
        {
            let op = match *sym {
                "==" => Operator::Eq,
                "!=" | "<>" => Operator::Ne,
                ">=" => Operator::Ge,
                "<=" => Operator::Le,
                ">" => Operator::Gt,
                "<" => Operator::Lt,
                "^=" => Operator::StartsWith { not: false },
                "$=" => Operator::EndsWith { not: false },
                "*=" => Operator::Contains { not: false },
                "~=" => Operator::ContainsField { not: false },
                _ => return Err(self.err(SyntaxCause::MissingOperator)),
            };
            self.idx += 1;
            let right = self.parse_value(SyntaxCause::MissingRightSide)?;
            ConstraintTest::Compare { op, right }
        } else {
            return Err(self.err(SyntaxCause::MissingOperator));
        };

        Ok(Constraint { left, test, pos })
    }

    fn parse_in_values(&mut self, not: bool) -> Result<ConstraintTest, SyntaxError> {
        if !self.eat_punct('(') {
            return Err(self.err(SyntaxCause::InvalidInOp));
        }
        let mut values = Vec::new();
        if !self.at_punct(')') {
            values.push(self.parse_value(SyntaxCause::InvalidInOp)?);
            while self.eat_punct(',') {
                values.push(self.parse_value(SyntaxCause::InvalidInOp)?);
            }
        }
        if !self.eat_punct(')') {
            return Err(self.err(SyntaxCause::InvalidInOp));
        }
        if values.is_empty() {
            return Err(self.err(SyntaxCause::InvalidInOp));
        }
        Ok(ConstraintTest::In { not, values })
    }

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        if !self.at_punct('(') {
            return Ok(Expression::Constraint(self.parse_constraint()?));
        }

        let pos = self.pos();
        self.expect_punct('(', "'('")?;
        let left = self.parse_expression()?;
        self.expect_punct(')', "')'")?;

        let op = if self.eat_keyword(Keyword::And) {
            LogicalOp::And
        } else if self.eat_keyword(Keyword::Or) {
            LogicalOp::Or
        } else {
            return Err(self.err(SyntaxCause::Expected("AND or OR")));
        };

        self.expect_punct('(', "'('")?;
        let right = self.parse_expression()?;
        self.expect_punct(')', "')'")?;

        Ok(Expression::Condition(Box::new(Condition {
            left,
            op,
            right,
            pos,
        })))
    }

    fn parse_order_by(&mut self) -> Result<OrderBy, SyntaxError> {
        let pos = self.pos();
        self.eat_keyword(Keyword::Order);
        if !self.eat_keyword(Keyword::By) {
            return Err(self.err(SyntaxCause::Expected("BY")));
        }

        let mut refs = Vec::new();
        let mut random = false;
        if self.eat_keyword(Keyword::Random) {
            self.expect_punct('(', "'('")?;
            self.expect_punct(')', "')'")?;
            random = true;
        } else {
            refs.push(self.parse_source_ref(SyntaxCause::MissingSourceKey)?);
            while self.eat_punct(',') {
                refs.push(self.parse_source_ref(SyntaxCause::MissingSourceKey)?);
            }
        }

        let direction = if self.eat_keyword(Keyword::Asc) {
            Some(Direction::Asc)
        } else if self.eat_keyword(Keyword::Desc) || self.eat_keyword(Keyword::Dsc) {
            Some(Direction::Desc)
        } else {
            None
        };

        Ok(OrderBy {
            refs,
            random,
            direction,
            pos,
        })
    }
}

/// Parse a token stream into a validated [`Syntax`] tree.
pub fn parse_tokens(toks: &[Token]) -> Result<Syntax, SyntaxError> {
    let start = toks.first().map(|t| t.pos).unwrap_or_default();
    let mut p = TokenParser { toks, idx: 0 };
    let mut syntax = Syntax {
        pos: start,
        ..Syntax::default()
    };

    if p.eat_keyword(Keyword::Lookup) {
        syntax.lookup = true;
        syntax.count = p.eat_keyword(Keyword::Count);
        syntax.distinct = p.eat_keyword(Keyword::Distinct);
        syntax.keys.push(p.parse_source_key(true)?);
        while p.eat_punct(',') {
            syntax.keys.push(p.parse_source_key(false)?);
        }
    } else if p.eat_keyword(Keyword::Query) {
        syntax.query = true;
        if p.at_key_start() {
            return Err(p.err(SyntaxCause::MismatchQuery));
        }
    } else {
        return Err(p.err(SyntaxCause::Expected("LOOKUP or QUERY")));
    }

    if p.eat_keyword(Keyword::Within) {
        syntax.within = Some(p.parse_expression()?);
    }
    if p.at_keyword(Keyword::Order) {
        syntax.order_by = Some(p.parse_order_by()?);
    }
    if p.eat_keyword(Keyword::Offset) {
        syntax.offset = Some(p.expect_int()?);
    }
    if p.eat_keyword(Keyword::Limit) {
        syntax.limit = Some(p.expect_int()?);
    }
    syntax.semicolon = p.eat_punct(';');

    if let Some(tok) = p.peek() {
        return Err(SyntaxError::new(
            tok.pos,
            SyntaxCause::Unexpected(tok.text.clone()),
        ));
    }

    syntax.init()?;
    syntax.validate()?;
    Ok(syntax)
}
