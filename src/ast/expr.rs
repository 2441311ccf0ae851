//! Filter expressions: constraints and boolean conditions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::keys::{SourceRef, SrcKey};
use crate::ast::operators::Operator;
use crate::ast::values::Value;
use crate::error::{Pos, SyntaxCause, SyntaxError};
use crate::value::EqlValue;

/// A filter expression: either a single constraint or a parenthesized
/// boolean combination of two sub-expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Constraint(Constraint),
    Condition(Box<Condition>),
}

impl Expression {
    pub fn validate(&self) -> Result<(), SyntaxError> {
        match self {
            Expression::Constraint(c) => c.validate(),
            Expression::Condition(c) => c.validate(),
        }
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        match self {
            Expression::Constraint(c) => c.find_sources(),
            Expression::Condition(c) => c.find_sources(),
        }
    }

    pub fn apply(&mut self, args: &[EqlValue]) -> Result<(), SyntaxError> {
        match self {
            Expression::Constraint(c) => c.apply(args),
            Expression::Condition(c) => c.apply(args),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constraint(c) => write!(f, "{c}"),
            Expression::Condition(c) => write!(f, "{c}"),
        }
    }
}

/// The boolean joining two expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

/// `( <expr> ) AND|OR ( <expr> )`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: Expression,
    pub op: LogicalOp,
    pub right: Expression,
    #[serde(skip)]
    pub pos: Pos,
}

impl Condition {
    pub fn validate(&self) -> Result<(), SyntaxError> {
        self.left.validate()?;
        self.right.validate()
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        let mut sources = self.left.find_sources();
        sources.extend(self.right.find_sources());
        sources
    }

    pub fn apply(&mut self, args: &[EqlValue]) -> Result<(), SyntaxError> {
        self.left.apply(args)?;
        self.right.apply(args)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {} ({})", self.left, self.op, self.right)
    }
}

/// The comparison applied to a constraint's left-hand reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintTest {
    /// `<ref> <op> <value>`
    Compare { op: Operator, right: Value },
    /// `<ref> [NOT] IN (<value>, …)`
    In { not: bool, values: Vec<Value> },
}

/// The comparison of a source reference against one or more values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub left: SourceRef,
    pub test: ConstraintTest,
    #[serde(skip)]
    pub pos: Pos,
}

impl Constraint {
    pub fn validate(&self) -> Result<(), SyntaxError> {
        self.left.validate().map_err(|e| {
            if e.cause == SyntaxCause::MissingSourceKey {
                SyntaxError::new(self.pos, SyntaxCause::MissingLeftSide)
            } else {
                e
            }
        })?;

        match &self.test {
            ConstraintTest::In { values, .. } => {
                if values.is_empty() {
                    return Err(SyntaxError::new(self.pos, SyntaxCause::InvalidInOp));
                }
                for value in values {
                    value.validate(self.pos)?;
                }
                Ok(())
            }
            ConstraintTest::Compare { right, .. } => right.validate(self.pos),
        }
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        let mut sources = self.left.find_sources();
        match &self.test {
            ConstraintTest::In { values, .. } => {
                for value in values {
                    sources.extend(value.find_sources());
                }
            }
            ConstraintTest::Compare { right, .. } => {
                sources.extend(right.find_sources());
            }
        }
        sources
    }

    pub fn apply(&mut self, args: &[EqlValue]) -> Result<(), SyntaxError> {
        let pos = self.pos;
        match &mut self.test {
            ConstraintTest::Compare { right, .. } => right.apply(args, pos),
            ConstraintTest::In { values, .. } => {
                for value in values {
                    value.apply(args, pos)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        match &self.test {
            ConstraintTest::In { not, values } => {
                if *not {
                    write!(f, " NOT")?;
                }
                write!(f, " IN (")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, ")")
            }
            ConstraintTest::Compare { op, right } => write!(f, " {op} {right}"),
        }
    }
}
