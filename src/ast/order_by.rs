//! ORDER BY clauses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::keys::{SourceRef, SrcKey};
use crate::error::{Pos, SyntaxCause, SyntaxError};

/// Sort direction; `DSC` in EQL text is an alias for `DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// `ORDER BY <refs…>|RANDOM() [ASC|DESC]` — one direction applies to every
/// term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub random: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip)]
    pub pos: Pos,
}

impl OrderBy {
    pub fn is_desc(&self) -> bool {
        matches!(self.direction, Some(Direction::Desc))
    }

    pub fn validate(&self) -> Result<(), SyntaxError> {
        if self.refs.is_empty() && !self.random && self.direction.is_none() {
            return Err(SyntaxError::new(self.pos, SyntaxCause::NilStructure));
        }
        for r in &self.refs {
            r.validate()?;
        }
        Ok(())
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        self.refs.iter().flat_map(SourceRef::find_sources).collect()
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY ")?;
        if self.random {
            write!(f, "RANDOM()")?;
        } else {
            for (idx, r) in self.refs.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{r}")?;
            }
        }
        if let Some(direction) = self.direction {
            write!(f, " {direction}")?;
        }
        Ok(())
    }
}
