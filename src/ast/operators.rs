//! Comparison operators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A comparison operation between a source reference and a value.
///
/// | Op   | Meaning                                  |
/// |------|------------------------------------------|
/// | `==` | equal to                                 |
/// | `!=` | not equal to (also `<>`)                 |
/// | `>=` | greater than or equal to                 |
/// | `<=` | less than or equal to                    |
/// | `>`  | greater than                             |
/// | `<`  | less than                                |
/// | LIKE | SQL LIKE, pattern passed through         |
/// | `^=` | starts with                              |
/// | `$=` | ends with                                |
/// | `*=` | contains                                 |
/// | `~=` | contains any whitespace-delimited field  |
///
/// The string family accepts a `NOT` (or `!`) modifier that flips the
/// generated `LIKE` into `NOT LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    Like { not: bool },
    StartsWith { not: bool },
    EndsWith { not: bool },
    Contains { not: bool },
    ContainsField { not: bool },
}

impl Operator {
    /// Whether this operator requires a string right-hand side.
    pub fn is_string_op(&self) -> bool {
        matches!(
            self,
            Operator::Like { .. }
                | Operator::StartsWith { .. }
                | Operator::EndsWith { .. }
                | Operator::Contains { .. }
                | Operator::ContainsField { .. }
        )
    }

    /// The `NOT` modifier, false for the plain comparison family.
    pub fn negated(&self) -> bool {
        match self {
            Operator::Like { not }
            | Operator::StartsWith { not }
            | Operator::EndsWith { not }
            | Operator::Contains { not }
            | Operator::ContainsField { not } => *not,
            _ => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated() {
            write!(f, "NOT ")?;
        }
        match self {
            Operator::Eq => write!(f, "=="),
            Operator::Ne => write!(f, "!="),
            Operator::Ge => write!(f, ">="),
            Operator::Le => write!(f, "<="),
            Operator::Gt => write!(f, ">"),
            Operator::Lt => write!(f, "<"),
            Operator::Like { .. } => write!(f, "LIKE"),
            Operator::StartsWith { .. } => write!(f, "^="),
            Operator::EndsWith { .. } => write!(f, "$="),
            Operator::Contains { .. } => write!(f, "*="),
            Operator::ContainsField { .. } => write!(f, "~="),
        }
    }
}
