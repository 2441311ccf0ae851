//! The polymorphic right-hand side of a constraint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::keys::{SourceRef, SrcKey};
use crate::error::{Pos, SyntaxCause, SyntaxError};
use crate::value::{EqlValue, TIME_FORMAT};

/// A literal, reference, or positional placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Ref(SourceRef),
    /// A 1-based `{N}` marker referring to the Nth runtime argument.
    Placeholder(usize),
}

impl Value {
    pub fn validate(&self, pos: Pos) -> Result<(), SyntaxError> {
        if let Value::Ref(r) = self {
            return r.validate().map_err(|_| SyntaxError::new(pos, SyntaxCause::NilStructure));
        }
        Ok(())
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        match self {
            Value::Ref(r) => r.find_sources(),
            _ => Vec::new(),
        }
    }

    /// Bind a placeholder to its typed argument. Placeholders whose index
    /// falls outside the argument vector are left in place.
    pub fn apply(&mut self, args: &[EqlValue], pos: Pos) -> Result<(), SyntaxError> {
        if let Value::Placeholder(n) = self {
            let idx = n.wrapping_sub(1);
            if *n >= 1 && idx < args.len() {
                *self = match &args[idx] {
                    EqlValue::Text(s) => Value::Text(s.clone()),
                    EqlValue::Int(i) => Value::Int(*i),
                    EqlValue::Float(f) => Value::Float(*f),
                    EqlValue::Bool(b) => Value::Bool(*b),
                    EqlValue::Null => Value::Null,
                    EqlValue::Time(t) => {
                        return Err(SyntaxError::new(
                            pos,
                            SyntaxCause::ValueType(t.format(TIME_FORMAT).to_string()),
                        ))
                    }
                };
            }
        }
        Ok(())
    }
}

/// Quote a string for EQL text, escaping backslashes and double quotes.
pub fn quote_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", quote_text(s)),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Null => write!(f, "NULL"),
            Value::Ref(r) => write!(f, "{r}"),
            Value::Placeholder(n) => write!(f, "{{{n}}}"),
        }
    }
}
