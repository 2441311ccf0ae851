//! Runtime argument values for placeholders and SQL parameters.

use std::fmt;

use chrono::NaiveDateTime;
use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::ToSql;

/// Format used when a time argument is bound or substituted into EQL text.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamically typed caller-supplied value.
///
/// These flow through placeholder preparation, `Value::apply` binding, and
/// the parameter vector handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum EqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(NaiveDateTime),
}

impl fmt::Display for EqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqlValue::Null => write!(f, "NULL"),
            EqlValue::Bool(true) => write!(f, "TRUE"),
            EqlValue::Bool(false) => write!(f, "FALSE"),
            EqlValue::Int(v) => write!(f, "{v}"),
            EqlValue::Float(v) => write!(f, "{v:?}"),
            EqlValue::Text(v) => write!(f, "{v}"),
            EqlValue::Time(v) => write!(f, "{}", v.format(TIME_FORMAT)),
        }
    }
}

impl ToSql for EqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            EqlValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            EqlValue::Bool(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v as i64)),
            EqlValue::Int(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v)),
            EqlValue::Float(v) => ToSqlOutput::Owned(SqliteValue::Real(*v)),
            EqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            EqlValue::Time(v) => {
                ToSqlOutput::Owned(SqliteValue::Text(v.format(TIME_FORMAT).to_string()))
            }
        })
    }
}

impl From<bool> for EqlValue {
    fn from(v: bool) -> Self {
        EqlValue::Bool(v)
    }
}

impl From<i32> for EqlValue {
    fn from(v: i32) -> Self {
        EqlValue::Int(v as i64)
    }
}

impl From<i64> for EqlValue {
    fn from(v: i64) -> Self {
        EqlValue::Int(v)
    }
}

impl From<f64> for EqlValue {
    fn from(v: f64) -> Self {
        EqlValue::Float(v)
    }
}

impl From<&str> for EqlValue {
    fn from(v: &str) -> Self {
        EqlValue::Text(v.to_string())
    }
}

impl From<String> for EqlValue {
    fn from(v: String) -> Self {
        EqlValue::Text(v)
    }
}

impl From<NaiveDateTime> for EqlValue {
    fn from(v: NaiveDateTime) -> Self {
        EqlValue::Time(v)
    }
}
