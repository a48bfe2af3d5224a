//! A live engine context holding the tables materialized for one connection.
//!
//! Tables are eagerly collected `DataFrame`s registered in a Polars
//! `SQLContext`. The session never builds SQL from table names without
//! validating and quoting them first.

use polars::prelude::*;
use polars_sql::SQLContext;
use std::sync::{Arc, Mutex};

/// Shared handle to a cached session. Identity is stable for the process lifetime.
pub type SessionHandle = Arc<Mutex<Session>>;

/// One column of a table as reported by [`Session::describe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Polars dtype display, e.g. `i64`, `f64`, `str`, `date`.
    pub data_type: String,
    pub nullable: bool,
}

pub struct Session {
    ctx: SQLContext,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            ctx: SQLContext::new(),
        }
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    /// Table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        self.ctx.get_tables()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.ctx.get_tables().iter().any(|t| t == table)
    }

    /// Register `df` as `table`, replacing any existing table of that name.
    pub fn register(&mut self, table: &str, df: DataFrame) {
        self.ctx.register(table, df.lazy());
    }

    /// Returns whether a table was dropped.
    pub fn drop_table(&mut self, table: &str) -> bool {
        if !self.contains(table) {
            return false;
        }
        self.ctx.unregister(table);
        true
    }

    /// Drop every table regardless of origin. Returns the dropped names.
    pub fn drop_all(&mut self) -> Vec<String> {
        let tables = self.ctx.get_tables();
        for table in &tables {
            self.ctx.unregister(table);
        }
        tables
    }

    /// Full contents of a table.
    pub fn frame(&mut self, table: &str) -> PolarsResult<DataFrame> {
        self.table_lazy(table)?.collect()
    }

    /// Column names and types, or `None` when the table does not exist.
    pub fn describe(&mut self, table: &str) -> PolarsResult<Option<Vec<ColumnInfo>>> {
        if !self.contains(table) {
            return Ok(None);
        }
        let schema = self.table_lazy(table)?.collect_schema()?;
        Ok(Some(
            schema
                .iter()
                .map(|(name, dtype)| ColumnInfo {
                    name: name.to_string(),
                    data_type: dtype.to_string(),
                    nullable: true,
                })
                .collect(),
        ))
    }

    /// Run one statement and collect its full result.
    pub fn execute(&mut self, sql: &str) -> PolarsResult<DataFrame> {
        self.ctx.execute(sql)?.collect()
    }

    fn table_lazy(&mut self, table: &str) -> PolarsResult<LazyFrame> {
        validate_table_name(table).map_err(|reason| PolarsError::InvalidOperation(reason.into()))?;
        self.ctx
            .execute(&format!("SELECT * FROM {}", quote_identifier(table)))
    }
}

/// Check that `name` can be used as a table name and as a file stem.
///
/// Rejects names that could escape SQL quoting or the connection folder.
pub fn validate_table_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if name.trim() != name {
        return Err("name has leading or trailing whitespace".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("'{}' is not allowed", name));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(*c, '"' | '\'' | ';' | '/' | '\\') || c.is_control())
    {
        return Err(format!("name contains forbidden character {:?}", c));
    }
    Ok(())
}

/// Double-quote an identifier for SQL, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
