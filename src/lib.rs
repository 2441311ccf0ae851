//! enjinql — an embedded query compiler exposing the Enjin Query Language
//! over a relational store.
//!
//! Callers declare *sources* (logical tables); the engine materializes them
//! as physical tables with indexes and uniqueness constraints, parses EQL
//! statements, and translates them into parameterized SQL with the INNER
//! JOINs inferred from the declared relationships.
//!
//! ```no_run
//! use enjinql::prelude::*;
//!
//! let config = Config::new("be_eql").add_source(
//!     SourceConfig::new("page")
//!         .string_value("shasum", 10)
//!         .string_value("stub", -1)
//!         .unique(&["shasum"]),
//! );
//! let conn = rusqlite::Connection::open_in_memory().unwrap();
//! let eql = EnjinQl::new(config, conn).unwrap();
//! let (query, args) = eql
//!     .to_sql("LOOKUP .ID WITHIN .Shasum == {1}", &["1234567890".into()])
//!     .unwrap();
//! # let _ = (query, args);
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod name;
pub mod parser;
pub mod schema;
pub mod transpiler;
pub mod tx;
pub mod value;

pub use parser::parse;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{parse_config, Config, SourceConfig, SourceConfigValue, SourceType};
    pub use crate::engine::{EngineOptions, EnjinQl, Row};
    pub use crate::error::{ConfigError, EqlError, EqlResult, SyntaxCause, SyntaxError};
    pub use crate::graph::Plan;
    pub use crate::parser::{parse, prepare_syntax};
    pub use crate::tx::SqlTx;
    pub use crate::value::EqlValue;
}
