//! Source-addressing nodes: projection keys and references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Pos, SyntaxCause, SyntaxError};

/// A projection entry: `<source>?.<key> (AS <alias>)?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip)]
    pub pos: Pos,
}

impl SourceKey {
    pub fn new(source: Option<String>, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
            alias: None,
            pos: Pos::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SyntaxError> {
        match &self.alias {
            Some(alias) if alias.is_empty() => {
                Err(SyntaxError::new(self.pos, SyntaxCause::NilStructure))
            }
            _ if self.key.is_empty() => {
                Err(SyntaxError::new(self.pos, SyntaxCause::MissingSourceKey))
            }
            _ => Ok(()),
        }
    }

    pub fn find_sources(&self) -> Vec<SrcKey> {
        vec![SrcKey {
            src: self.source.clone().unwrap_or_default(),
            key: self.key.clone(),
            alias: self.alias.clone().unwrap_or_default(),
        }]
    }

    /// The canonical reference form, dropping any `AS` suffix.
    pub fn as_key(&self) -> SrcKey {
        SrcKey {
            src: self.source.clone().unwrap_or_default(),
            key: self.key.clone(),
            alias: self.alias.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}")?;
        }
        write!(f, ".{}", self.key)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// A reference to a key within a source, or to an alias declared elsewhere
/// in the same statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip)]
    pub pos: Pos,
}

impl SourceRef {
    pub fn keyed(source: Option<String>, key: impl Into<String>) -> Self {
        Self {
            source,
            key: Some(key.into()),
            alias: None,
            pos: Pos::default(),
        }
    }

    pub fn aliased(alias: impl Into<String>) -> Self {
        Self {
            source: None,
            key: None,
            alias: Some(alias.into()),
            pos: Pos::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SyntaxError> {
        match &self.alias {
            Some(alias) if alias.is_empty() => {
                Err(SyntaxError::new(self.pos, SyntaxCause::NilStructure))
            }
            Some(_) => Ok(()),
            None if self.key.is_none() => {
                Err(SyntaxError::new(self.pos, SyntaxCause::MissingSourceKey))
            }
            None => Ok(()),
        }
    }

    /// Alias-only references contribute nothing; they resolve through the
    /// statement's alias table instead.
    pub fn find_sources(&self) -> Vec<SrcKey> {
        match &self.key {
            None => Vec::new(),
            Some(key) => vec![SrcKey {
                src: self.source.clone().unwrap_or_default(),
                key: key.clone(),
                alias: self.alias.clone().unwrap_or_default(),
            }],
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.alias, &self.source, &self.key) {
            (Some(alias), _, _) => write!(f, "{alias}"),
            (None, Some(source), Some(key)) => write!(f, "{source}.{key}"),
            (None, None, Some(key)) => write!(f, ".{key}"),
            _ => Ok(()),
        }
    }
}

/// A plain source/key pair used during reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SrcKey {
    pub src: String,
    pub key: String,
    pub alias: String,
}

impl fmt::Display for SrcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.alias.is_empty() {
            write!(f, "{}", self.alias)
        } else if self.src.is_empty() {
            write!(f, ".{}", self.key)
        } else {
            write!(f, "{}.{}", self.src, self.key)
        }
    }
}
