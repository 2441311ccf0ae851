//! The transaction shim: the only way to add or remove indexed rows.
//!
//! Commit and rollback consume the handle, so a transaction can be
//! finalized exactly once.

use rusqlite::{params_from_iter, Transaction};

use crate::error::{EqlError, EqlResult};
use crate::schema::Sources;
use crate::transpiler::ddl;
use crate::value::EqlValue;

pub struct SqlTx<'eql> {
    tx: Transaction<'eql>,
    sources: &'eql Sources,
}

impl<'eql> SqlTx<'eql> {
    pub(crate) fn new(tx: Transaction<'eql>, sources: &'eql Sources) -> Self {
        Self { tx, sources }
    }

    /// Insert a row into the named source. Values are supplied in declared
    /// column order, excluding `id`; trailing columns may be omitted but
    /// extra values are rejected. Returns the new row's surrogate id.
    pub fn insert(&self, source: &str, values: &[EqlValue]) -> EqlResult<i64> {
        let src = self
            .sources
            .get(source)
            .ok_or_else(|| EqlError::SourceNotFound(source.to_string()))?;
        if values.is_empty() {
            return Err(EqlError::insert(EqlError::NoValues));
        }
        let order = src.value_order();
        if values.len() > order.len() {
            return Err(EqlError::insert(EqlError::TooManyValues));
        }

        let columns = order[..values.len()].to_vec();
        let table = self.sources.formal(src.name(), &[]);
        let sql = ddl::insert_sql(&table, &columns);
        self.tx
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| EqlError::insert(e.into()))?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Delete a row by its surrogate id; ids must be positive. Returns the
    /// number of rows removed.
    pub fn delete(&self, source: &str, id: i64) -> EqlResult<u64> {
        let src = self
            .sources
            .get(source)
            .ok_or_else(|| EqlError::SourceNotFound(source.to_string()))?;
        if id <= 0 {
            return Err(EqlError::delete(EqlError::InvalidId));
        }
        let table = self.sources.formal(src.name(), &[]);
        let affected = self
            .tx
            .execute(&ddl::delete_by_id_sql(&table), [id])
            .map_err(|e| EqlError::delete(e.into()))?;
        Ok(affected as u64)
    }

    /// Delete every row whose `key` column equals `value`.
    pub fn delete_where_eq(&self, source: &str, key: &str, value: EqlValue) -> EqlResult<u64> {
        let src = self
            .sources
            .get(source)
            .ok_or_else(|| EqlError::SourceNotFound(source.to_string()))?;
        let table = self.sources.formal(src.name(), &[]);
        let column = src.column(key).ok_or_else(|| EqlError::ColumnNotFound {
            table: table.clone(),
            key: key.to_string(),
        })?;
        let affected = self
            .tx
            .execute(&ddl::delete_where_sql(&table, &column.key), [&value])
            .map_err(|e| EqlError::delete(e.into()))?;
        Ok(affected as u64)
    }

    /// Run a raw statement within this transaction.
    pub fn execute(&self, query: &str, args: &[EqlValue]) -> EqlResult<u64> {
        let affected = self.tx.execute(query, params_from_iter(args.iter()))?;
        Ok(affected as u64)
    }

    pub fn commit(self) -> EqlResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> EqlResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
