//! The EQL abstract syntax tree.

pub mod expr;
pub mod keys;
pub mod operators;
pub mod order_by;
pub mod values;

pub use self::expr::{Condition, Constraint, ConstraintTest, Expression, LogicalOp};
pub use self::keys::{SourceKey, SourceRef, SrcKey};
pub use self::operators::Operator;
pub use self::order_by::{Direction, OrderBy};
pub use self::values::Value;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Pos, SyntaxCause, SyntaxError};
use crate::value::EqlValue;

/// The root of a parsed EQL statement.
///
/// Exactly one of `lookup` or `query` is set once [`Syntax::init`] has run:
/// `LOOKUP` enumerates keys, `QUERY` returns the primary source's stub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Syntax {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub lookup: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<SourceKey>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub query: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub semicolon: bool,
    #[serde(skip)]
    pub pos: Pos,
}

impl Syntax {
    /// Normalize a statement missing its mode: keys present means `LOOKUP`,
    /// otherwise `QUERY`.
    pub fn init(&mut self) -> Result<(), SyntaxError> {
        if !self.lookup && !self.query {
            if self.count || self.distinct {
                if self.keys.len() != 1 {
                    let cause = if self.count {
                        SyntaxCause::CountRequiresOneKey
                    } else {
                        SyntaxCause::DistinctRequiresOneKey
                    };
                    return Err(SyntaxError::new(self.pos, cause));
                }
                self.lookup = true;
            } else if !self.keys.is_empty() {
                self.lookup = true;
            } else {
                self.query = true;
            }
        }
        Ok(())
    }

    /// Check the structural invariants of the statement.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        if self.query {
            if !self.keys.is_empty() {
                return Err(SyntaxError::new(self.pos, SyntaxCause::MismatchQuery));
            }
        } else if self.lookup {
            if self.keys.is_empty() {
                return Err(SyntaxError::new(self.pos, SyntaxCause::MismatchLookup));
            }
            if self.count && self.keys.len() != 1 {
                return Err(SyntaxError::new(self.pos, SyntaxCause::CountRequiresOneKey));
            }
            if self.distinct && self.keys.len() != 1 {
                return Err(SyntaxError::new(
                    self.pos,
                    SyntaxCause::DistinctRequiresOneKey,
                ));
            }
        }

        for key in &self.keys {
            key.validate()?;
        }
        if let Some(within) = &self.within {
            within.validate()?;
        }
        if let Some(order_by) = &self.order_by {
            order_by.validate()?;
        }
        if matches!(self.offset, Some(n) if n < 0) {
            return Err(SyntaxError::new(self.pos, SyntaxCause::NegativeOffset));
        }
        if matches!(self.limit, Some(n) if n < 0) {
            return Err(SyntaxError::new(self.pos, SyntaxCause::NegativeLimit));
        }
        Ok(())
    }

    /// Collect every source reference in the statement, in evaluation order.
    pub fn find_sources(&self) -> Vec<SrcKey> {
        let mut sources: Vec<SrcKey> = Vec::new();
        for key in &self.keys {
            sources.extend(key.find_sources());
        }
        if let Some(within) = &self.within {
            sources.extend(within.find_sources());
        }
        if let Some(order_by) = &self.order_by {
            sources.extend(order_by.find_sources());
        }
        sources
    }

    /// Bind `{N}` placeholders left inside string literals to their typed
    /// arguments.
    pub fn apply(&mut self, args: &[EqlValue]) -> Result<(), SyntaxError> {
        if let Some(within) = &mut self.within {
            within.apply(args)?;
        }
        Ok(())
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.validate().is_err() {
            return Ok(());
        }

        if self.query {
            write!(f, "QUERY")?;
        } else {
            write!(f, "LOOKUP")?;
            if self.count {
                write!(f, " COUNT")?;
            }
            if self.distinct {
                write!(f, " DISTINCT")?;
            }
            for (idx, key) in self.keys.iter().enumerate() {
                if idx > 0 {
                    write!(f, ",")?;
                }
                write!(f, " {key}")?;
            }
        }

        if let Some(within) = &self.within {
            write!(f, " WITHIN {within}")?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " {order_by}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if self.semicolon {
            write!(f, ";")?;
        }
        Ok(())
    }
}
