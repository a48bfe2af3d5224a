//! Typed outcomes for connection, load, publish, and query operations.
//!
//! Nothing here is fatal: every failure is returned to the caller of the
//! operation that produced it. Per-file and per-table failures are collected
//! into reports instead of aborting the batch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Bad connection name or folder at add time. No state is mutated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("connection name must not be empty")]
    EmptyName,
    #[error("folder path must not be empty")]
    EmptyPath,
    #[error("{} is not an existing directory", .0.display())]
    NotADirectory(PathBuf),
}

/// A lookup that named something the workbench does not have.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("no connection named '{0}'")]
    Connection(String),
    #[error("table '{table}' does not exist in connection '{connection}'")]
    Table { connection: String, table: String },
    #[error("no connection is selected")]
    NoActiveConnection,
}

/// Why a single CSV file could not become a table.
#[derive(Debug, Error)]
pub enum FileLoadError {
    #[error("{}: file name is not a usable table name: {reason}", .path.display())]
    InvalidTableName { path: PathBuf, reason: String },
    #[error("{}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        table: String,
        reason: String,
    },
}

impl FileLoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::InvalidTableName { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

/// The folder itself could not be scanned.
#[derive(Debug, Error)]
#[error("failed to read folder {}: {source}", .path.display())]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// One table that could not be written during publish.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to publish {table}: {reason}")]
pub struct PublishFailure {
    pub table: String,
    pub reason: String,
}

/// Outcome of a query that produced no rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no query provided")]
    NoQuery,
    /// Engine error text, verbatim.
    #[error("{0}")]
    Engine(String),
}

/// Failure reading or writing the connection catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("catalog {} is not a name-to-folder map: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write catalog {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Umbrella error for [`crate::ConnectionManager`] and [`crate::Workbench`] operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The table exists but its schema could not be read.
    #[error("cannot describe table '{table}': {reason}")]
    Describe { table: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::EmptyName.to_string(),
            "connection name must not be empty"
        );
        let err = ValidationError::NotADirectory(PathBuf::from("/no/such/dir"));
        assert!(err.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn test_engine_error_is_verbatim() {
        let err = QueryError::Engine("sql parser error: Expected an SQL statement".to_string());
        assert_eq!(
            err.to_string(),
            "sql parser error: Expected an SQL statement"
        );
    }

    #[test]
    fn test_connection_error_is_transparent() {
        let err: ConnectionError = NotFoundError::Connection("sales".to_string()).into();
        assert_eq!(err.to_string(), "no connection named 'sales'");
    }
}
