//! DDL and DML statement emission for the engine's driver shim.

use crate::schema::{Source, Sources};

fn quote_list(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// `CREATE TABLE IF NOT EXISTS` for one source, with its UNIQUE tuples as
/// table constraints.
pub fn create_table_sql(sources: &Sources, source: &Source) -> String {
    let table = sources.formal(source.name(), &[]);
    let mut defs: Vec<String> = Vec::new();

    for key in source.column_order() {
        if let Some(column) = source.column(key) {
            let mut line = format!("\"{}\" {}", column.key, column.sql_type());
            if column.primary_key {
                line.push_str(" PRIMARY KEY");
            }
            if column.not_null {
                line.push_str(" NOT NULL");
            }
            defs.push(line);
        }
    }

    for tuple in source.unique_tuples() {
        defs.push(format!("UNIQUE ({})", quote_list(tuple)));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" ({});",
        defs.join(", ")
    )
}

/// `CREATE INDEX IF NOT EXISTS` for one index tuple; returns the computed
/// index name alongside the statement.
pub fn create_index_sql(sources: &Sources, source: &Source, keys: &[String]) -> (String, String) {
    let table = sources.formal(source.name(), &[]);
    let more: Vec<&str> = keys.iter().map(String::as_str).collect();
    let index = sources.formal(source.name(), &more);
    let sql = format!(
        "CREATE INDEX IF NOT EXISTS \"{index}\" ON \"{table}\" ({});",
        quote_list(keys)
    );
    (index, sql)
}

/// Parameterized INSERT over the leading `columns`.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let marks = columns.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({marks});",
        quote_list(columns)
    )
}

/// DELETE by surrogate id.
pub fn delete_by_id_sql(table: &str) -> String {
    format!("DELETE FROM \"{table}\" WHERE \"id\"=?;")
}

/// DELETE by a single column equality.
pub fn delete_where_sql(table: &str, column: &str) -> String {
    format!("DELETE FROM \"{table}\" WHERE \"{column}\"=?;")
}
