//! Application state for a host UI.
//!
//! Owns the connection manager, the selected connection, the last query
//! outcome, and the notices a host shows after each action.

use std::path::Path;

use crate::connection::ConnectionManager;
use crate::error::{ConnectionError, NotFoundError, QueryError};
use crate::loader::LoadReport;
use crate::publisher::PublishReport;
use crate::query::QueryResult;
use crate::session::ColumnInfo;

pub struct Workbench {
    manager: ConnectionManager,
    active: Option<String>,
    last_outcome: Option<Result<QueryResult, QueryError>>,
    notices: Vec<String>,
}

impl Workbench {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            active: None,
            last_outcome: None,
            notices: Vec::new(),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Result or error of the most recent query; replaced by the next one.
    pub fn last_outcome(&self) -> Option<&Result<QueryResult, QueryError>> {
        self.last_outcome.as_ref()
    }

    /// Notices accumulated since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn add_connection(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), ConnectionError> {
        match self.manager.add_connection(name, path) {
            Ok(report) => {
                self.note_load(&report);
                self.notices.push(format!("Database '{}' added", name));
                Ok(())
            }
            Err(e @ ConnectionError::Validation(_)) => {
                self.notices.push("Invalid DB name or path".to_string());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Make `name` the active connection, creating its session if needed.
    pub fn select(&mut self, name: &str) -> Result<(), ConnectionError> {
        let (_, report) = self.manager.open_session(name)?;
        if let Some(report) = report {
            self.note_load(&report);
        }
        if self.active.as_deref() != Some(name) {
            self.last_outcome = None;
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Run `sql` on the active connection and keep the outcome.
    ///
    /// Blank input leaves the previous outcome in place and returns
    /// [`QueryError::NoQuery`].
    pub fn run(&mut self, sql: &str) -> Result<(), ConnectionError> {
        let name = self.require_active()?.to_string();
        if sql.trim().is_empty() {
            self.notices
                .push("Please enter a SQL query to run.".to_string());
            return Err(QueryError::NoQuery.into());
        }

        let outcome = self.manager.execute(&name, sql)?;
        if let Ok(result) = &outcome {
            if result.is_empty() {
                self.notices
                    .push("Query executed. No rows returned.".to_string());
            }
        }
        self.last_outcome = Some(outcome);
        Ok(())
    }

    pub fn tables(&self) -> Result<Vec<String>, ConnectionError> {
        let name = self.require_active()?;
        self.manager.list_tables(name)
    }

    pub fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectionError> {
        let name = self.require_active()?;
        self.manager.describe_table(name, table)
    }

    /// Full resync of the active connection from its folder.
    pub fn reload(&mut self) -> Result<LoadReport, ConnectionError> {
        let name = self.require_active()?.to_string();
        let report = self.manager.reload(&name)?;
        self.note_load(&report);
        self.notices.push("Tables loaded from folder".to_string());
        Ok(report)
    }

    pub fn publish(&mut self) -> Result<PublishReport, ConnectionError> {
        let name = self.require_active()?.to_string();
        let report = self.manager.publish(&name)?;
        for failure in &report.failures {
            self.notices.push(failure.to_string());
        }
        if report.is_success() {
            self.notices.push("All changes published to CSV".to_string());
        } else {
            self.notices.push(format!(
                "Published {} table(s), {} failed",
                report.written.len(),
                report.failures.len()
            ));
        }
        Ok(report)
    }

    fn require_active(&self) -> Result<&str, NotFoundError> {
        self.active.as_deref().ok_or(NotFoundError::NoActiveConnection)
    }

    fn note_load(&mut self, report: &LoadReport) {
        self.notices.push(report.summary());
        for failure in &report.failures {
            self.notices.push(failure.to_string());
        }
    }
}
