//! The engine facade: config in, schema up, EQL through to the database.

use std::collections::HashMap;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::ast::Syntax;
use crate::config::Config;
use crate::error::{EqlError, EqlResult, Pos, SyntaxCause, SyntaxError};
use crate::parser;
use crate::schema::Sources;
use crate::transpiler::{self, ddl};
use crate::tx::SqlTx;
use crate::value::EqlValue;

/// One result row, keyed by column name.
pub type Row = HashMap<String, serde_json::Value>;

/// Startup switches for [`EnjinQl::with_options`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub skip_create_tables: bool,
    pub skip_create_indexes: bool,
}

/// A built enjinql instance over an owned sqlite connection.
///
/// Dropping or [`EnjinQl::close`]-ing the engine releases the connection;
/// ownership guarantees it happens exactly once.
#[derive(Debug)]
pub struct EnjinQl {
    config: Config,
    sources: Sources,
    conn: Connection,
}

impl EnjinQl {
    /// Validate the config, build the schema, and create tables and
    /// indexes.
    pub fn new(config: Config, conn: Connection) -> EqlResult<Self> {
        Self::with_options(config, conn, EngineOptions::default())
    }

    pub fn with_options(
        config: Config,
        conn: Connection,
        options: EngineOptions,
    ) -> EqlResult<Self> {
        let sources = Sources::build(&config)?;
        let eql = Self {
            config,
            sources,
            conn,
        };
        if !options.skip_create_tables {
            eql.create_tables()?;
        }
        if !options.skip_create_indexes {
            eql.create_indexes()?;
        }
        Ok(eql)
    }

    /// Issue `CREATE TABLE IF NOT EXISTS` for every source, each in its own
    /// transaction, stopping at the first error.
    pub fn create_tables(&self) -> EqlResult<()> {
        for source in self.sources.iter() {
            let table = self.sources.formal(source.name(), &[]);
            let sql = ddl::create_table_sql(&self.sources, source);
            debug!(table = %table, "create table");
            let tx = self.conn.unchecked_transaction()?;
            if let Err(e) = tx.execute(&sql, []) {
                return Err(EqlError::CreateTable { table, source: e });
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Issue `CREATE INDEX IF NOT EXISTS` for every declared index tuple,
    /// each in its own transaction, stopping at the first error.
    pub fn create_indexes(&self) -> EqlResult<()> {
        for source in self.sources.iter() {
            for tuple in source.index_tuples() {
                let (name, sql) = ddl::create_index_sql(&self.sources, source, tuple);
                debug!(index = %name, "create index");
                let tx = self.conn.unchecked_transaction()?;
                if let Err(e) = tx.execute(&sql, []) {
                    return Err(EqlError::CreateIndex { name, source: e });
                }
                tx.commit()?;
            }
        }
        Ok(())
    }

    /// Parse an EQL statement, substituting and binding placeholders from
    /// `args`.
    pub fn parse(&self, format: &str, args: &[EqlValue]) -> EqlResult<Syntax> {
        let prepared = parser::prepare_syntax(format, args);
        if prepared.trim().is_empty() {
            return Err(SyntaxError::new(Pos::default(), SyntaxCause::EmptyInput).into());
        }
        let mut parsed = parser::parse(&prepared)?;
        parsed.apply(args)?;
        Ok(parsed)
    }

    /// Compile a parsed statement to `(query, args)`.
    pub fn parsed_to_sql(&self, parsed: &Syntax) -> EqlResult<(String, Vec<EqlValue>)> {
        let compiled = transpiler::compile(&self.sources, parsed)?;
        Ok((compiled.query, compiled.args))
    }

    /// Parse and compile in one step.
    pub fn to_sql(&self, format: &str, args: &[EqlValue]) -> EqlResult<(String, Vec<EqlValue>)> {
        let parsed = self.parse(format, args)?;
        self.parsed_to_sql(&parsed)
    }

    /// Summarize the join plan for a statement as `(brief, verbose)`.
    pub fn plan(&self, format: &str, args: &[EqlValue]) -> EqlResult<(String, String)> {
        let parsed = self.parse(format, args)?;
        let plan = transpiler::prepare_plan(&self.sources, &parsed)?;
        Ok((plan.brief(), plan.verbose()))
    }

    /// Parse, compile, and execute a statement, returning column order and
    /// rows.
    pub fn perform(&self, format: &str, args: &[EqlValue]) -> EqlResult<(Vec<String>, Vec<Row>)> {
        let (query, bound) = self.to_sql(format, args)?;
        self.sql_query(&query, &bound)
    }

    /// Execute a raw SELECT, returning column order and rows.
    pub fn sql_query(&self, query: &str, args: &[EqlValue]) -> EqlResult<(Vec<String>, Vec<Row>)> {
        debug!(%query, "sql query");
        let mut stmt = self.conn.prepare(query)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut results: Vec<Row> = Vec::new();
        while let Some(row) = rows.next()? {
            let mut out = Row::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                out.insert(column.clone(), value_ref_to_json(row.get_ref(idx)?));
            }
            results.push(out);
        }
        Ok((columns, results))
    }

    /// Execute a raw statement, returning `(last_insert_id, affected)`.
    pub fn sql_exec(&self, query: &str, args: &[EqlValue]) -> EqlResult<(i64, u64)> {
        debug!(%query, "sql exec");
        let affected = self.conn.execute(query, params_from_iter(args.iter()))?;
        Ok((self.conn.last_insert_rowid(), affected as u64))
    }

    /// Start a transaction for inserting and deleting indexed rows.
    pub fn sql_begin(&self) -> EqlResult<SqlTx<'_>> {
        let tx = self.conn.unchecked_transaction()?;
        Ok(SqlTx::new(tx, &self.sources))
    }

    /// The formal table name for a source, if it exists.
    pub fn table(&self, source: &str) -> Option<String> {
        self.sources
            .get(source)
            .map(|s| self.sources.formal(s.name(), &[]))
    }

    /// A clone of this engine's configuration.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Compact JSON for the configuration.
    pub fn marshal(&self) -> EqlResult<String> {
        Ok(serde_json::to_string(&self.config)?)
    }

    /// Indented JSON for the configuration.
    pub fn to_json(&self) -> EqlResult<String> {
        Ok(serde_json::to_string_pretty(&self.config)?)
    }

    /// Check that the underlying connection still answers.
    pub fn ready(&self) -> EqlResult<()> {
        self.conn.query_row("SELECT 1;", [], |_| Ok(()))?;
        Ok(())
    }

    /// Close the engine and its connection.
    pub fn close(self) -> EqlResult<()> {
        self.conn.close().map_err(|(_, e)| EqlError::Sql(e))
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use serde_json::json;

    fn page_config() -> Config {
        Config::new("be_eql").add_source(
            SourceConfig::new("page")
                .string_value("shasum", 10)
                .unique(&["shasum"])
                .index(&["shasum"]),
        )
    }

    fn new_engine() -> EnjinQl {
        EnjinQl::new(page_config(), Connection::open_in_memory().unwrap()).unwrap()
    }

    fn names(eql: &EnjinQl, kind: &str) -> Vec<String> {
        let (_, rows) = eql
            .sql_query(
                "SELECT \"name\" FROM sqlite_master WHERE \"type\"=? ORDER BY \"name\";",
                &[EqlValue::Text(kind.into())],
            )
            .unwrap();
        rows.into_iter()
            .filter_map(|r| r.get("name").and_then(|v| v.as_str().map(String::from)))
            .filter(|n| !n.starts_with("sqlite_"))
            .collect()
    }

    #[test]
    fn creates_tables_and_indexes() {
        let eql = new_engine();
        assert_eq!(names(&eql, "table"), vec!["be_eql_page".to_string()]);
        assert_eq!(names(&eql, "index"), vec!["be_eql_page_shasum".to_string()]);
        assert!(eql.ready().is_ok());
    }

    #[test]
    fn skip_options_leave_database_empty() {
        let eql = EnjinQl::with_options(
            page_config(),
            Connection::open_in_memory().unwrap(),
            EngineOptions {
                skip_create_tables: true,
                skip_create_indexes: true,
            },
        )
        .unwrap();
        assert!(names(&eql, "table").is_empty());
    }

    #[test]
    fn marshal_round_trips() {
        let eql = new_engine();
        let data = eql.marshal().unwrap();
        assert_eq!(
            data,
            r#"{"prefix":"be_eql","sources":[{"name":"page","values":[{"string":{"key":"shasum","size":10}}],"unique":[["shasum"]],"index":[["shasum"]]}]}"#
        );
        let restored = crate::config::parse_config(&data).unwrap();
        assert_eq!(restored, eql.config());
    }

    #[test]
    fn perform_empty_table() {
        let eql = new_engine();
        let (columns, rows) = eql.perform("LOOKUP .Shasum", &[]).unwrap();
        assert_eq!(columns, vec!["shasum".to_string()]);
        assert!(rows.is_empty());
    }

    #[test]
    fn insert_lookup_delete() {
        let eql = new_engine();

        let tx = eql.sql_begin().unwrap();
        let a = tx.insert("page", &[EqlValue::Text("1234567890".into())]).unwrap();
        let b = tx.insert("page", &[EqlValue::Text("0123456789".into())]).unwrap();
        assert!(a > 0 && b > a);
        assert!(matches!(
            tx.insert("nope", &[EqlValue::Int(1)]),
            Err(EqlError::SourceNotFound(_))
        ));
        assert!(matches!(
            tx.insert("page", &[]),
            Err(EqlError::InsertRow(_))
        ));
        assert!(matches!(
            tx.insert(
                "page",
                &[EqlValue::Text("x".into()), EqlValue::Text("y".into())]
            ),
            Err(EqlError::InsertRow(_))
        ));
        tx.commit().unwrap();

        let (columns, rows) = eql.perform("LOOKUP .ID, .Shasum ORDER BY .ID", &[]).unwrap();
        assert_eq!(columns, vec!["id".to_string(), "shasum".to_string()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["shasum"], json!("1234567890"));
        assert_eq!(rows[1]["shasum"], json!("0123456789"));

        let (_, rows) = eql
            .perform(
                "LOOKUP .ID WITHIN .Shasum == {1}",
                &[EqlValue::Text("1234567890".into())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));

        let tx = eql.sql_begin().unwrap();
        assert_eq!(tx.delete("page", a).unwrap(), 1);
        assert_eq!(tx.delete("page", 42).unwrap(), 0);
        assert!(matches!(
            tx.delete("page", 0),
            Err(EqlError::DeleteRows(_))
        ));
        assert_eq!(
            tx.delete_where_eq("page", "Shasum", EqlValue::Text("0123456789".into()))
                .unwrap(),
            1
        );
        tx.commit().unwrap();

        let (_, rows) = eql.perform("LOOKUP .ID", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn rollback_discards_rows() {
        let eql = new_engine();
        let tx = eql.sql_begin().unwrap();
        tx.insert("page", &[EqlValue::Text("abcdef1234".into())]).unwrap();
        tx.rollback().unwrap();
        let (_, rows) = eql.perform("LOOKUP .ID", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn plan_summary() {
        let eql = new_engine();
        let (brief, verbose) = eql.plan("LOOKUP .Shasum", &[]).unwrap();
        assert_eq!(brief, "[page]");
        assert!(verbose.contains("TOP\tonly table\tpage"));
    }

    #[test]
    fn parse_empty_rejected() {
        let eql = new_engine();
        match eql.parse("", &[]) {
            Err(EqlError::Syntax(e)) => assert_eq!(e.cause, SyntaxCause::EmptyInput),
            other => panic!("expected empty input error, got {other:?}"),
        }
    }

    #[test]
    fn close_consumes_engine() {
        let eql = new_engine();
        eql.close().unwrap();
    }
}
