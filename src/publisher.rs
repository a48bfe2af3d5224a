//! Writes every table in a session back to `<folder>/<table>.csv`.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::PublishFailure;
use crate::error_display::{user_message_from_io, user_message_from_polars};
use crate::session::{validate_table_name, Session};

#[derive(Debug, Default)]
pub struct PublishReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TablePublisher;

impl TablePublisher {
    /// Publish every table, whatever its origin. One table failing does not stop the rest.
    pub fn publish(&self, session: &mut Session, folder: &Path) -> PublishReport {
        let mut report = PublishReport::default();

        for table in session.tables() {
            match write_table(session, &table, folder) {
                Ok(path) => {
                    tracing::debug!("published {} to {}", table, path.display());
                    report.written.push(path);
                }
                Err(reason) => {
                    let failure = PublishFailure { table, reason };
                    tracing::warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        tracing::info!(
            "published {} table(s) to {} ({} failed)",
            report.written.len(),
            folder.display(),
            report.failures.len()
        );
        report
    }
}

fn write_table(session: &mut Session, table: &str, folder: &Path) -> Result<PathBuf, String> {
    validate_table_name(table)?;
    let target = folder.join(format!("{}.csv", table));

    let mut df = session
        .frame(table)
        .map_err(|e| user_message_from_polars(&e))?;

    // Write beside the target and rename so a failed write never truncates the old file.
    let mut tmp = NamedTempFile::new_in(folder).map_err(|e| user_message_from_io(&e, None))?;
    CsvWriter::new(tmp.as_file_mut())
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)
        .map_err(|e| user_message_from_polars(&e))?;
    tmp.persist(&target)
        .map_err(|e| user_message_from_io(&e.error, None))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_publish_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();
        session.register(
            "orders",
            df!("id" => [1i64, 2], "note" => [Some("a"), None]).unwrap(),
        );

        let report = TablePublisher.publish(&mut session, dir.path());
        assert!(report.is_success());
        assert_eq!(report.written, vec![dir.path().join("orders.csv")]);

        let content = fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        assert_eq!(content, "id,note\n1,a\n2,\n");
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();
        let empty = df!("id" => Vec::<i64>::new(), "name" => Vec::<String>::new()).unwrap();
        session.register("empty", empty);

        TablePublisher.publish(&mut session, dir.path());
        let content = fs::read_to_string(dir.path().join("empty.csv")).unwrap();
        assert_eq!(content.trim_end(), "id,name");
    }

    #[test]
    fn test_unsafe_name_fails_alone() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();
        session.register("../escape", df!("x" => [1i64]).unwrap());
        session.register("ok", df!("x" => [1i64]).unwrap());

        let report = TablePublisher.publish(&mut session, dir.path());
        assert_eq!(report.written, vec![dir.path().join("ok.csv")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].table, "../escape");
        assert!(!dir.path().parent().unwrap().join("escape.csv").exists());
    }

    #[test]
    fn test_unwritable_folder_reports_every_table() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();
        session.register("a", df!("x" => [1i64]).unwrap());
        session.register("b", df!("x" => [2i64]).unwrap());

        let report = TablePublisher.publish(&mut session, &dir.path().join("missing"));
        assert!(report.written.is_empty());
        let failed: Vec<&str> = report.failures.iter().map(|f| f.table.as_str()).collect();
        assert_eq!(failed, vec!["a", "b"]);
    }
}
