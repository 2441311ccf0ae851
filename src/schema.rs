//! The resolved schema: sources as physical tables with typed columns.
//!
//! Built from a validated [`Config`]; owns the relationship graph used by
//! the planner.

use std::collections::HashMap;

use crate::config::{Config, SourceConfig, SourceConfigValue};
use crate::error::{ConfigError, EqlError, EqlResult};
use crate::graph::{SourceGraph, SourceJoin};
use crate::name;

/// The surrogate primary key column present on every source table.
pub const SOURCE_ID_KEY: &str = "id";

/// The column a `QUERY` statement projects from the primary source.
pub const SOURCE_STUB_KEY: &str = "stub";

/// The storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Bool,
    Float,
    Time,
    String,
    /// An integer foreign key referencing another source's `id`.
    Link,
}

/// A column descriptor within a source table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: String,
    pub ty: ColumnType,
    pub size: i32,
    pub not_null: bool,
    pub primary_key: bool,
}

impl Column {
    fn new(key: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            key: key.into(),
            ty,
            size: 0,
            not_null: false,
            primary_key: false,
        }
    }

    /// The SQL type this column declares in DDL.
    pub fn sql_type(&self) -> String {
        match self.ty {
            ColumnType::Int | ColumnType::Link => "INTEGER".to_string(),
            ColumnType::Bool => "BOOLEAN".to_string(),
            ColumnType::Float => "DOUBLE".to_string(),
            ColumnType::Time => "DATETIME".to_string(),
            ColumnType::String => {
                if self.size > 0 {
                    format!("VARCHAR({})", self.size)
                } else {
                    "TEXT".to_string()
                }
            }
        }
    }
}

/// One resolved source: its columns in DDL order and its join metadata.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    parent: Option<String>,
    order: Vec<String>,
    columns: HashMap<String, Column>,
    unique: Vec<Vec<String>>,
    indexes: Vec<Vec<String>>,
    links: Vec<String>,
    primary_value: String,
}

impl Source {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Declared columns in order, excluding the implicit `id`. This is the
    /// order insert values are supplied in.
    pub fn value_order(&self) -> &[String] {
        &self.order
    }

    /// All columns in DDL order: `id` first, then the declared values.
    pub fn column_order(&self) -> Vec<&str> {
        let mut order = Vec::with_capacity(self.order.len() + 1);
        order.push(SOURCE_ID_KEY);
        order.extend(self.order.iter().map(String::as_str));
        order
    }

    pub fn unique_tuples(&self) -> &[Vec<String>] {
        &self.unique
    }

    pub fn index_tuples(&self) -> &[Vec<String>] {
        &self.indexes
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// The primary value: the parent FK when parented, else the first
    /// declared value.
    pub fn primary_value(&self) -> &str {
        &self.primary_value
    }

    pub fn is_data(&self) -> bool {
        self.parent.is_none() && self.links.is_empty()
    }

    pub fn is_linked(&self) -> bool {
        !self.is_data()
    }

    /// Look up a column descriptor; the key is snake-cased first.
    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.get(&name::snake(key))
    }
}

/// The full resolved schema, addressable by source name.
#[derive(Debug)]
pub struct Sources {
    prefix: String,
    order: Vec<String>,
    lookup: HashMap<String, Source>,
    graph: SourceGraph,
}

impl Sources {
    /// Build the schema from a config, validating it first. The graph is
    /// checked for cycles once every source is in place.
    pub fn build(config: &Config) -> EqlResult<Self> {
        config.validate()?;
        let mut sources = Sources {
            prefix: name::snake(&config.prefix),
            order: Vec::new(),
            lookup: HashMap::new(),
            graph: SourceGraph::new(),
        };
        for sc in &config.sources {
            sources.add_source(sc)?;
        }
        sources.graph.validate()?;
        Ok(sources)
    }

    fn add_source(&mut self, sc: &SourceConfig) -> EqlResult<()> {
        if self.lookup.contains_key(&sc.name) {
            return Err(ConfigError::DuplicateSource(sc.name.clone()).into());
        }

        let primary = self.primary_name();
        let mut columns: HashMap<String, Column> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut link_names: Vec<String> = Vec::new();
        let mut link_joins: Vec<(String, SourceJoin)> = Vec::new();

        let mut id = Column::new(SOURCE_ID_KEY, ColumnType::Int);
        id.not_null = true;
        id.primary_key = true;
        columns.insert(SOURCE_ID_KEY.to_string(), id);

        let mut parent_edge: Option<(String, SourceJoin)> = None;
        if let Some(parent) = &sc.parent {
            if !self.lookup.contains_key(parent) {
                return Err(ConfigError::ParentNotFound {
                    source_name: sc.name.clone(),
                    parent: parent.clone(),
                }
                .into());
            }
            let fk = format!("{parent}_{SOURCE_ID_KEY}");
            let mut column = Column::new(fk.clone(), ColumnType::Link);
            column.not_null = true;
            columns.insert(fk, column);
            parent_edge = Some((parent.clone(), SourceJoin::parent_of(&sc.name, parent)));
        }

        for value in &sc.values {
            let column = match value {
                SourceConfigValue::Int { key } => Column::new(key, ColumnType::Int),
                SourceConfigValue::Bool { key } => Column::new(key, ColumnType::Bool),
                SourceConfigValue::Time { key } => Column::new(key, ColumnType::Time),
                SourceConfigValue::Float { key } => Column::new(key, ColumnType::Float),
                SourceConfigValue::String { key, size } => {
                    let mut column = Column::new(key, ColumnType::String);
                    column.size = *size;
                    column
                }
                SourceConfigValue::Linked { source, key } => {
                    let fk = format!("{source}_{key}");
                    let mut column = Column::new(fk, ColumnType::Link);
                    column.not_null = true;
                    // the implicit edge to the primary source is never a
                    // link, it would open a second path to the top
                    if primary.as_deref() != Some(source.as_str()) {
                        link_names.push(source.clone());
                        link_joins.push((
                            source.clone(),
                            SourceJoin::link_to(&sc.name, source, key),
                        ));
                    }
                    column
                }
            };
            order.push(column.key.clone());
            columns.insert(column.key.clone(), column);
        }

        if let Some(parent) = &sc.parent {
            order.insert(0, format!("{parent}_{SOURCE_ID_KEY}"));
        }

        let primary_value = order
            .first()
            .cloned()
            .ok_or_else(|| ConfigError::NoSourceValues(sc.name.clone()))?;

        self.graph.add(&sc.name, parent_edge, link_joins)?;

        let source = Source {
            name: sc.name.clone(),
            parent: sc.parent.clone(),
            order,
            columns,
            unique: sc.unique.clone(),
            indexes: sc.index.clone(),
            links: link_names,
            primary_value,
        };
        self.order.push(sc.name.clone());
        self.lookup.insert(sc.name.clone(), source);
        Ok(())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The physical table name for a source, with any extra parts appended.
    pub fn formal(&self, source: &str, more: &[&str]) -> String {
        name::formal(&self.prefix, source, more)
    }

    /// Strip the prefix from a formal name.
    pub fn alias(&self, formal: &str) -> String {
        name::alias(&self.prefix, formal)
    }

    fn primary_name(&self) -> Option<String> {
        self.order.first().cloned()
    }

    /// The first declared source.
    pub fn primary(&self) -> Option<&Source> {
        self.order.first().and_then(|n| self.lookup.get(n))
    }

    /// Look up a source by name (snake-cased first).
    pub fn get(&self, source: &str) -> Option<&Source> {
        self.lookup.get(&name::snake(source))
    }

    /// Sources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.order.iter().filter_map(|n| self.lookup.get(n))
    }

    pub fn graph(&self) -> &SourceGraph {
        &self.graph
    }

    /// Resolve a `<source>.<key>` pair to its column descriptor.
    pub fn column(&self, source: &str, key: &str) -> EqlResult<&Column> {
        let src = self
            .get(source)
            .ok_or_else(|| EqlError::TableNotFound(source.to_string()))?;
        src.column(key).ok_or_else(|| EqlError::ColumnNotFound {
            table: self.formal(src.name(), &[]),
            key: key.to_string(),
        })
    }
}
