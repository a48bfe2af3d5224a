//! Materializes a folder's CSV files as session tables.

use polars::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{FileLoadError, LoadError};
use crate::error_display::user_message_from_polars;
use crate::session::{validate_table_name, Session};

/// Delimiters considered when sniffing a header line.
const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rows used for type inference; `None` scans the whole file.
    pub infer_schema_length: Option<usize>,
    pub try_parse_dates: bool,
    pub ignore_errors: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            infer_schema_length: Some(10000),
            try_parse_dates: true,
            ignore_errors: false,
        }
    }
}

/// What a load pass did. Partial success is normal.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub folder: PathBuf,
    /// CSV files found and attempted.
    pub attempted: usize,
    /// Tables (re)created, in file-name order.
    pub loaded: Vec<String>,
    pub failures: Vec<FileLoadError>,
    /// Tables dropped before loading (full resync only).
    pub dropped: Vec<String>,
}

impl LoadReport {
    /// Number of tables (re)loaded.
    pub fn count(&self) -> usize {
        self.loaded.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} table(s) loaded from {}",
            self.count(),
            self.folder.display()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableLoader {
    options: LoadOptions,
}

impl TableLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load every `*.csv` directly inside `folder`, overwriting same-named tables.
    ///
    /// Tables whose names match no file are left untouched. A file that fails
    /// to parse loses its table (it was dropped first) and is reported.
    pub fn load(&self, session: &mut Session, folder: &Path) -> Result<LoadReport, LoadError> {
        let files = list_csv_files(folder)?;
        let mut report = LoadReport {
            folder: folder.to_path_buf(),
            attempted: files.len(),
            ..LoadReport::default()
        };

        for path in files {
            match self.load_file(session, &path) {
                Ok(table) => {
                    tracing::debug!("loaded {} as table {}", path.display(), table);
                    report.loaded.push(table);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Full resync: drop every table in the session, then [`TableLoader::load`].
    ///
    /// Afterwards the session mirrors the folder exactly, including removal of
    /// tables created through ad-hoc SQL.
    pub fn reload(&self, session: &mut Session, folder: &Path) -> Result<LoadReport, LoadError> {
        // Scan first so an unreadable folder leaves the session intact.
        list_csv_files(folder)?;
        let dropped = session.drop_all();
        let mut report = self.load(session, folder)?;
        report.dropped = dropped;
        Ok(report)
    }

    fn load_file(&self, session: &mut Session, path: &Path) -> Result<String, FileLoadError> {
        let table = table_name_for(path)?;
        session.drop_table(&table);

        let df = self.read_csv(path).map_err(|e| FileLoadError::Parse {
            path: path.to_path_buf(),
            table: table.clone(),
            reason: e,
        })?;
        session.register(&table, df);
        Ok(table)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame, String> {
        let separator = sniff_delimiter(path).map_err(|e| e.to_string())?;

        let mut read_options = CsvReadOptions::default();
        read_options.has_header = true;
        read_options.infer_schema_length = self.options.infer_schema_length;
        read_options.ignore_errors = self.options.ignore_errors;
        let try_parse_dates = self.options.try_parse_dates;
        read_options = read_options.map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_try_parse_dates(try_parse_dates)
        });

        let df = read_options
            .try_into_reader_with_file_path(Some(path.into()))
            .and_then(|reader| reader.finish())
            .map_err(|e| user_message_from_polars(&e))?;

        trim_column_names(df).map_err(|e| user_message_from_polars(&e))
    }
}

/// `*.csv` files directly inside `folder` (extension matched case-insensitively), sorted by name.
pub fn list_csv_files(folder: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let read_err = |source: std::io::Error| LoadError {
        path: folder.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Table name for a CSV file: the file name without its extension.
pub fn table_name_for(path: &Path) -> Result<String, FileLoadError> {
    let invalid = |reason: String| FileLoadError::InvalidTableName {
        path: path.to_path_buf(),
        reason,
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?;
    validate_table_name(stem).map_err(invalid)?;
    Ok(stem.to_string())
}

/// Pick the delimiter that occurs most often (outside quotes) in the header line.
fn sniff_delimiter(path: &Path) -> std::io::Result<u8> {
    let file = fs::File::open(path)?;
    let mut header = String::new();
    BufReader::new(file).read_line(&mut header)?;
    Ok(detect_delimiter(&header))
}

fn detect_delimiter(header: &str) -> u8 {
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    for b in header.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == b) {
            counts[idx] += 1;
        }
    }

    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    CANDIDATE_DELIMITERS[best]
}

fn trim_column_names(df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let trimmed: Vec<String> = names.iter().map(|s| s.trim().to_string()).collect();
    if names == trimmed {
        return Ok(df);
    }
    df.lazy()
        .rename(
            names.iter().map(|s| s.as_str()),
            trimmed.iter().map(|s| s.as_str()),
            false,
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("id,amount\n"), b',');
        assert_eq!(detect_delimiter("id;amount;note\n"), b';');
        assert_eq!(detect_delimiter("id\tamount\n"), b'\t');
        assert_eq!(detect_delimiter("\"a;b\",c\n"), b',');
        assert_eq!(detect_delimiter("single\n"), b',');
    }

    #[test]
    fn test_list_csv_files_is_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("a.CSV"), "x\n1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.csv"), "x\n1\n").unwrap();

        let names: Vec<String> = list_csv_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_load_infers_types_and_trims_headers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("orders.csv"),
            "id, amount ,paid,placed\n1,9.5,true,2024-01-02\n2,3.25,false,2024-02-03\n",
        )
        .unwrap();

        let mut session = Session::new();
        let report = TableLoader::default().load(&mut session, dir.path()).unwrap();
        assert_eq!(report.count(), 1);
        assert_eq!(report.attempted, 1);

        let columns = session.describe("orders").unwrap().unwrap();
        let described: Vec<(String, String)> = columns
            .into_iter()
            .map(|c| (c.name, c.data_type))
            .collect();
        assert_eq!(
            described,
            vec![
                ("id".to_string(), "i64".to_string()),
                ("amount".to_string(), "f64".to_string()),
                ("paid".to_string(), "bool".to_string()),
                ("placed".to_string(), "date".to_string()),
            ]
        );
    }

    #[test]
    fn test_semicolon_file_loads() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("eu.csv"), "id;price\n1;2\n3;4\n").unwrap();
        let mut session = Session::new();
        TableLoader::default().load(&mut session, dir.path()).unwrap();
        let df = session.frame("eu").unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_bad_file_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.csv"), "id\n1\n2\n").unwrap();
        fs::write(dir.path().join("ragged.csv"), "a,b\n1,2,3,4\n").unwrap();
        fs::write(dir.path().join("it's.csv"), "id\n1\n").unwrap();

        let mut session = Session::new();
        let report = TableLoader::default().load(&mut session, dir.path()).unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.loaded, vec!["good"]);
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f, FileLoadError::InvalidTableName { .. })));
        assert_eq!(session.tables(), vec!["good"]);
    }

    #[test]
    fn test_load_keeps_unrelated_tables_reload_drops_them() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("orders.csv"), "id\n1\n").unwrap();

        let loader = TableLoader::default();
        let mut session = Session::new();
        loader.load(&mut session, dir.path()).unwrap();
        session
            .execute("CREATE TABLE scratch AS SELECT * FROM orders")
            .unwrap();

        loader.load(&mut session, dir.path()).unwrap();
        assert_eq!(session.tables(), vec!["orders", "scratch"]);

        let report = loader.reload(&mut session, dir.path()).unwrap();
        assert_eq!(report.dropped, vec!["orders", "scratch"]);
        assert_eq!(session.tables(), vec!["orders"]);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();
        session.register("keep", df!("x" => [1i64]).unwrap());
        let missing = dir.path().join("gone");
        assert!(TableLoader::default()
            .reload(&mut session, &missing)
            .is_err());
        assert_eq!(session.tables(), vec!["keep"]);
    }
}
