//! Error types for enjinql.

use std::fmt;

use thiserror::Error;

/// Result type alias for enjinql operations.
pub type EqlResult<T> = Result<T, EqlError>;

/// A line/column position within an EQL statement, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A syntax failure, carrying the position it was detected at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{pos} invalid syntax: {cause}")]
pub struct SyntaxError {
    pub pos: Pos,
    pub cause: SyntaxCause,
}

impl SyntaxError {
    pub fn new(pos: Pos, cause: SyntaxCause) -> Self {
        Self { pos, cause }
    }
}

/// The specific cause behind an `invalid syntax` failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxCause {
    #[error("nil structure")]
    NilStructure,
    #[error("missing source key")]
    MissingSourceKey,
    #[error("missing operator")]
    MissingOperator,
    #[error("missing left-hand side expression")]
    MissingLeftSide,
    #[error("missing right-hand side expression")]
    MissingRightSide,
    #[error("invalid constraint")]
    InvalidConstraint,
    #[error("<SourceKey> [NOT] IN (<list>...)")]
    InvalidInOp,
    #[error("negative offset")]
    NegativeOffset,
    #[error("negative limit")]
    NegativeLimit,
    #[error("operator requires a string argument")]
    OpStringRequired,
    #[error("unsupported syntax value type: {0:?}")]
    ValueType(String),
    #[error("QUERY does not return keyed values; use LOOKUP for specific keys")]
    MismatchQuery,
    #[error("LOOKUP requires at least one source key; use QUERY for whole records")]
    MismatchLookup,
    #[error("COUNT requires exactly one source key")]
    CountRequiresOneKey,
    #[error("DISTINCT requires exactly one source key")]
    DistinctRequiresOneKey,
    #[error("unknown source key alias: {0:?}")]
    UnknownAlias(String),
    #[error("empty input")]
    EmptyInput,
    #[error("unexpected character: {0:?}")]
    Character(char),
    #[error("unexpected token: {0:?}")]
    Unexpected(String),
    #[error("expected {0}")]
    Expected(&'static str),
}

/// Configuration validation failures; first error wins, with field context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one source is required")]
    NoSources,
    #[error("unnamed source (#{0})")]
    UnnamedSource(usize),
    #[error("at least one source value is required ({0:?})")]
    NoSourceValues(String),
    #[error("all names and keys must be snake_cased ({input:?} is not {snake:?})")]
    NotSnakeCased { input: String, snake: String },
    #[error("empty source value ({source_name:?} value #{index})")]
    EmptySourceValue { source_name: String, index: usize },
    #[error("source value key is empty ({source_name:?} value #{index})")]
    EmptySourceValueKey { source_name: String, index: usize },
    #[error("parent not found ({source_name:?} needs {parent:?} declared first)")]
    ParentNotFound { source_name: String, parent: String },
    #[error("duplicate source name: {0:?}")]
    DuplicateSource(String),
    #[error("unknown {kind} key {key:?} in source {source_name:?}")]
    UnknownTupleKey {
        source_name: String,
        kind: &'static str,
        key: String,
    },
}

#[derive(Debug, Error)]
pub enum EqlError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    #[error("source not found: {0:?}")]
    SourceNotFound(String),
    #[error("table not found: {0:?}")]
    TableNotFound(String),
    #[error("column not found: {table:?}.{key:?}")]
    ColumnNotFound { table: String, key: String },
    #[error("column config not found: {0:?}")]
    ColumnConfigNotFound(String),
    #[error("unknown source reference: {0:?}")]
    UnknownReference(String),

    #[error("error building create table sql: {0:?}")]
    CreateTableSql(String),
    #[error("error creating table: {table:?} - {source}")]
    CreateTable {
        table: String,
        source: rusqlite::Error,
    },
    #[error("error building create index sql: {0:?}")]
    CreateIndexSql(String),
    #[error("error creating index: {name:?} - {source}")]
    CreateIndex {
        name: String,
        source: rusqlite::Error,
    },

    #[error("eql query statements require a \"stub\" column")]
    QueryRequiresStub,

    #[error("circular dependency cycle: {0:?}")]
    CircularDependency(Vec<String>),
    #[error("not enough constraints to resolve a plan including: {pending:?}, did plan: {plan}")]
    UnresolvedPlan { pending: Vec<String>, plan: String },

    #[error("insert row error: {0}")]
    InsertRow(#[source] Box<EqlError>),
    #[error("delete rows error: {0}")]
    DeleteRows(#[source] Box<EqlError>),
    #[error("too many values given")]
    TooManyValues,
    #[error("at least the first column value is required")]
    NoValues,
    #[error("row identifiers must be greater than zero")]
    InvalidId,

    #[error("builder error: {0}")]
    BuilderError(String),
    #[error("invalid json data: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("use parse_config and EnjinQl::new to restore an engine instance")]
    UnmarshalEnjinQl,

    #[error("connection closed")]
    Closed,
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl EqlError {
    /// Wrap a failure from the insert path.
    pub(crate) fn insert(err: EqlError) -> Self {
        EqlError::InsertRow(Box::new(err))
    }

    /// Wrap a failure from the delete path.
    pub(crate) fn delete(err: EqlError) -> Self {
        EqlError::DeleteRows(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = SyntaxError::new(Pos::new(2, 7), SyntaxCause::MissingOperator);
        assert_eq!(err.to_string(), "2:7 invalid syntax: missing operator");
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::NotSnakeCased {
            input: "PageWords".into(),
            snake: "page_words".into(),
        };
        assert_eq!(
            EqlError::from(err).to_string(),
            "invalid config: all names and keys must be snake_cased (\"PageWords\" is not \"page_words\")"
        );
    }

    #[test]
    fn wrapped_execution_errors() {
        let err = EqlError::insert(EqlError::NoValues);
        assert_eq!(
            err.to_string(),
            "insert row error: at least the first column value is required"
        );
        assert!(matches!(err, EqlError::InsertRow(_)));
    }
}
