//! Engine configuration: sources, their values, and the JSON surface.
//!
//! A [`Config`] can be built fluently, constructed directly, or parsed from
//! JSON with [`parse_config`]. Validation is first-error-wins and reports
//! the offending source and value index.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EqlResult};
use crate::name::{is_snake, snake};
use crate::schema::SOURCE_ID_KEY;

/// Top-level engine configuration. Source order is significant: the first
/// declared source is the primary source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Configuration for one source (logical table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub values: Vec<SourceConfigValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index: Vec<Vec<String>>,
}

/// A single indexed value owned by a source. Exactly one variant applies;
/// the external JSON tag gives the `{"string":{"key":…,"size":…}}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceConfigValue {
    Int {
        key: String,
    },
    Bool {
        key: String,
    },
    Time {
        key: String,
    },
    Float {
        key: String,
    },
    String {
        key: String,
        size: i32,
    },
    Linked {
        #[serde(rename = "table")]
        source: String,
        key: String,
    },
}

impl SourceConfigValue {
    /// The column name this value materializes as. Linked values become a
    /// `<source>_<key>` foreign key column.
    pub fn column_name(&self) -> String {
        match self {
            SourceConfigValue::Int { key }
            | SourceConfigValue::Bool { key }
            | SourceConfigValue::Time { key }
            | SourceConfigValue::Float { key }
            | SourceConfigValue::String { key, .. } => key.clone(),
            SourceConfigValue::Linked { source, key } => format!("{source}_{key}"),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, SourceConfigValue::Linked { .. })
    }
}

/// Classification of a source by its relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// No parent and no linked values.
    Data,
    /// A parent or at least one linked value, but not both.
    Link,
    /// Both a parent and at least one linked value.
    Join,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Data => write!(f, "data"),
            SourceType::Link => write!(f, "link"),
            SourceType::Join => write!(f, "join"),
        }
    }
}

impl Config {
    /// Start a new config with the given prefix (snake-cased on the way in).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: snake(&prefix.into()),
            sources: Vec::new(),
        }
    }

    /// Append a source, builder style.
    pub fn add_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|sc| sc.name == name)
    }

    /// All source names in declaration order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|sc| sc.name.as_str()).collect()
    }

    /// Compact JSON; restore with [`parse_config`].
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Indented JSON; restore with [`parse_config`].
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check the whole config, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.prefix.is_empty() {
            must_snake(&self.prefix)?;
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut declared: HashSet<&str> = HashSet::new();
        for (idx, sc) in self.sources.iter().enumerate() {
            sc.validate(idx, &declared)?;
            if !declared.insert(&sc.name) {
                return Err(ConfigError::DuplicateSource(sc.name.clone()));
            }
        }
        Ok(())
    }
}

impl SourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            values: Vec::new(),
            unique: Vec::new(),
            index: Vec::new(),
        }
    }

    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    pub fn int_value(self, key: impl Into<String>) -> Self {
        self.value(SourceConfigValue::Int { key: key.into() })
    }

    pub fn bool_value(self, key: impl Into<String>) -> Self {
        self.value(SourceConfigValue::Bool { key: key.into() })
    }

    pub fn time_value(self, key: impl Into<String>) -> Self {
        self.value(SourceConfigValue::Time { key: key.into() })
    }

    pub fn float_value(self, key: impl Into<String>) -> Self {
        self.value(SourceConfigValue::Float { key: key.into() })
    }

    /// Add a string value column. A size of zero or below means unbounded
    /// text; otherwise it is a capacity hint.
    pub fn string_value(self, key: impl Into<String>, size: i32) -> Self {
        self.value(SourceConfigValue::String {
            key: key.into(),
            size,
        })
    }

    /// Add a cross-source link to another, previously declared source.
    pub fn linked_value(self, source: impl Into<String>, key: impl Into<String>) -> Self {
        self.value(SourceConfigValue::Linked {
            source: source.into(),
            key: key.into(),
        })
    }

    pub fn value(mut self, value: SourceConfigValue) -> Self {
        self.values.push(value);
        self
    }

    /// Add a composite UNIQUE constraint over the given keys.
    pub fn unique(mut self, keys: &[&str]) -> Self {
        self.unique.push(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Add a composite INDEX over the given keys.
    pub fn index(mut self, keys: &[&str]) -> Self {
        self.index.push(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn source_type(&self) -> SourceType {
        let linked = self.values.iter().any(SourceConfigValue::is_linked);
        match (self.parent.is_some(), linked) {
            (false, false) => SourceType::Data,
            (true, true) => SourceType::Join,
            _ => SourceType::Link,
        }
    }

    fn validate(&self, idx: usize, declared: &HashSet<&str>) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::UnnamedSource(idx + 1));
        }
        must_snake(&self.name)?;

        if self.values.is_empty() && self.parent.is_none() {
            return Err(ConfigError::NoSourceValues(self.name.clone()));
        }

        if let Some(parent) = &self.parent {
            must_snake(parent)?;
            if !declared.contains(parent.as_str()) {
                return Err(ConfigError::ParentNotFound {
                    source_name: self.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        for (jdx, value) in self.values.iter().enumerate() {
            self.validate_value(jdx, value, declared)?;
        }

        let known = self.known_keys();
        for tuple in &self.unique {
            for key in tuple {
                if !known.contains(key.as_str()) {
                    return Err(ConfigError::UnknownTupleKey {
                        source_name: self.name.clone(),
                        kind: "unique",
                        key: key.clone(),
                    });
                }
            }
        }
        for tuple in &self.index {
            for key in tuple {
                if !known.contains(key.as_str()) {
                    return Err(ConfigError::UnknownTupleKey {
                        source_name: self.name.clone(),
                        kind: "index",
                        key: key.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_value(
        &self,
        jdx: usize,
        value: &SourceConfigValue,
        declared: &HashSet<&str>,
    ) -> Result<(), ConfigError> {
        let key = match value {
            SourceConfigValue::Int { key }
            | SourceConfigValue::Bool { key }
            | SourceConfigValue::Time { key }
            | SourceConfigValue::Float { key }
            | SourceConfigValue::String { key, .. } => key,
            SourceConfigValue::Linked { source, key } => {
                if source.is_empty() {
                    return Err(ConfigError::EmptySourceValueKey {
                        source_name: self.name.clone(),
                        index: jdx + 1,
                    });
                }
                must_snake(source)?;
                if !declared.contains(source.as_str()) {
                    return Err(ConfigError::ParentNotFound {
                        source_name: self.name.clone(),
                        parent: source.clone(),
                    });
                }
                key
            }
        };
        if key.is_empty() {
            return Err(ConfigError::EmptySourceValueKey {
                source_name: self.name.clone(),
                index: jdx + 1,
            });
        }
        must_snake(key)
    }

    /// The column names usable in unique/index tuples: the implicit id, the
    /// source's own name, the parent FK, and every declared value column.
    fn known_keys(&self) -> HashSet<String> {
        let mut known: HashSet<String> = HashSet::new();
        known.insert(SOURCE_ID_KEY.to_string());
        known.insert(self.name.clone());
        if let Some(parent) = &self.parent {
            known.insert(format!("{parent}_{SOURCE_ID_KEY}"));
        }
        for value in &self.values {
            known.insert(value.column_name());
        }
        known
    }
}

fn must_snake(input: &str) -> Result<(), ConfigError> {
    if !is_snake(input) {
        return Err(ConfigError::NotSnakeCased {
            input: input.to_string(),
            snake: snake(input),
        });
    }
    Ok(())
}

/// Unmarshal JSON into a validated [`Config`].
pub fn parse_config(data: &str) -> EqlResult<Config> {
    let config: Config = serde_json::from_str(data)?;
    config.validate()?;
    Ok(config)
}
