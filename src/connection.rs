//! Named connections and their cached sessions.
//!
//! Every engine access goes through a [`SessionHandle`] obtained here. The
//! session cache and the catalog are each guarded by a mutex; when both are
//! needed the catalog is locked first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::CatalogStore;
use crate::error::{ConnectionError, NotFoundError, QueryError, ValidationError};
use crate::loader::{LoadReport, TableLoader};
use crate::publisher::{PublishReport, TablePublisher};
use crate::query::{QueryExecutor, QueryResult};
use crate::session::{ColumnInfo, Session, SessionHandle};

pub struct ConnectionManager {
    catalog: Mutex<CatalogStore>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    loader: TableLoader,
    publisher: TablePublisher,
    executor: QueryExecutor,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionManager {
    pub fn new(catalog: CatalogStore, loader: TableLoader) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            sessions: Mutex::new(HashMap::new()),
            loader,
            publisher: TablePublisher,
            executor: QueryExecutor,
        }
    }

    /// Registered connections as (name, folder), sorted by name.
    pub fn connections(&self) -> Vec<(String, PathBuf)> {
        lock(&self.catalog)
            .entries()
            .map(|(name, path)| (name.to_string(), path.to_path_buf()))
            .collect()
    }

    pub fn folder(&self, name: &str) -> Result<PathBuf, NotFoundError> {
        lock(&self.catalog)
            .get(name)
            .map(Path::to_path_buf)
            .ok_or_else(|| NotFoundError::Connection(name.to_string()))
    }

    /// Validate, load the folder into a fresh session, persist `name -> path`,
    /// and cache the session, replacing any previous session for `name`.
    pub fn add_connection(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<LoadReport, ConnectionError> {
        let path = path.as_ref();
        validate_connection(name, path)?;

        let mut session = Session::new();
        let report = self.loader.load(&mut session, path)?;

        let mut catalog = lock(&self.catalog);
        if let Some(previous) = catalog.insert(name, path)? {
            if previous != path {
                tracing::info!(
                    "connection {} moved from {} to {}",
                    name,
                    previous.display(),
                    path.display()
                );
            }
        }
        lock(&self.sessions).insert(name.to_string(), session.into_handle());
        drop(catalog);

        tracing::info!("connection {} added: {}", name, report.summary());
        Ok(report)
    }

    /// Cached session for `name`, creating and loading it on first access.
    pub fn get_or_create_session(&self, name: &str) -> Result<SessionHandle, ConnectionError> {
        self.open_session(name).map(|(handle, _)| handle)
    }

    /// Like [`ConnectionManager::get_or_create_session`], also returning the
    /// load report when this call created the session.
    pub fn open_session(
        &self,
        name: &str,
    ) -> Result<(SessionHandle, Option<LoadReport>), ConnectionError> {
        let folder = self.folder(name)?;
        let mut sessions = lock(&self.sessions);
        if let Some(handle) = sessions.get(name) {
            return Ok((Arc::clone(handle), None));
        }

        let mut session = Session::new();
        let report = self.loader.load(&mut session, &folder)?;
        let handle = session.into_handle();
        sessions.insert(name.to_string(), Arc::clone(&handle));
        tracing::debug!("session created for {}", name);
        Ok((handle, Some(report)))
    }

    /// Tables currently in the session, sorted. Reflects session state, not the folder.
    pub fn list_tables(&self, name: &str) -> Result<Vec<String>, ConnectionError> {
        let handle = self.get_or_create_session(name)?;
        let tables = lock(&*handle).tables();
        Ok(tables)
    }

    pub fn describe_table(
        &self,
        name: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, ConnectionError> {
        let handle = self.get_or_create_session(name)?;
        let described = lock(&*handle).describe(table);
        match described {
            Ok(Some(columns)) => Ok(columns),
            Ok(None) => Err(NotFoundError::Table {
                connection: name.to_string(),
                table: table.to_string(),
            }
            .into()),
            Err(e) => {
                tracing::warn!("describe {}.{} failed: {}", name, table, e);
                Err(ConnectionError::Describe {
                    table: table.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Overwrite tables that match the folder's CSV files; other tables stay.
    pub fn load(&self, name: &str) -> Result<LoadReport, ConnectionError> {
        let folder = self.folder(name)?;
        let handle = self.get_or_create_session(name)?;
        let report = self.loader.load(&mut lock(&*handle), &folder)?;
        Ok(report)
    }

    /// Full resync: the session ends up holding exactly the folder's CSV files.
    pub fn reload(&self, name: &str) -> Result<LoadReport, ConnectionError> {
        let folder = self.folder(name)?;
        let handle = self.get_or_create_session(name)?;
        let report = self.loader.reload(&mut lock(&*handle), &folder)?;
        Ok(report)
    }

    pub fn publish(&self, name: &str) -> Result<PublishReport, ConnectionError> {
        let folder = self.folder(name)?;
        let handle = self.get_or_create_session(name)?;
        let report = self.publisher.publish(&mut lock(&*handle), &folder);
        Ok(report)
    }

    /// Run one statement against the connection's session.
    ///
    /// The outer error covers an unknown connection; the inner result is the
    /// query outcome itself.
    pub fn execute(
        &self,
        name: &str,
        sql: &str,
    ) -> Result<Result<QueryResult, QueryError>, ConnectionError> {
        let handle = self.get_or_create_session(name)?;
        let outcome = self.executor.execute(&mut lock(&*handle), sql);
        Ok(outcome)
    }
}

fn validate_connection(name: &str, path: &Path) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if !path.is_dir() {
        return Err(ValidationError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}
