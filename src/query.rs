//! Runs one SQL statement against a session and normalizes the outcome.

use polars::prelude::*;
use std::time::Instant;

use crate::error::QueryError;
use crate::session::Session;

/// Rows produced by a successful statement.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub frame: DataFrame,
}

impl QueryResult {
    fn new(frame: DataFrame) -> Self {
        let columns = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self { columns, frame }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Values of row `idx` rendered as text; nulls render as an empty string.
    pub fn row_values(&self, idx: usize) -> Option<Vec<String>> {
        let row = self.frame.get(idx)?;
        Some(
            row.into_iter()
                .map(|value| match value {
                    AnyValue::Null => String::new(),
                    other => other
                        .get_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute `sql` and collect the full result eagerly.
    ///
    /// Rows whose every value is null (or an empty string) are dropped. Engine
    /// failures come back as [`QueryError::Engine`] with the engine's text.
    pub fn execute(&self, session: &mut Session, sql: &str) -> Result<QueryResult, QueryError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(QueryError::NoQuery);
        }

        let started = Instant::now();
        let outcome = session
            .execute(sql)
            .and_then(drop_empty_rows)
            .map(QueryResult::new)
            .map_err(|e| QueryError::Engine(e.to_string()));

        match &outcome {
            Ok(result) => tracing::debug!(
                "query returned {} row(s) in {:?}",
                result.rows(),
                started.elapsed()
            ),
            Err(e) => tracing::debug!("query failed after {:?}: {}", started.elapsed(), e),
        }
        outcome
    }
}

/// Remove rows where every column is null or, for string columns, empty.
///
/// The mask is built from the columns themselves, so names such as `*` or
/// `^a.*$` are never read as selectors.
pub fn drop_empty_rows(df: DataFrame) -> PolarsResult<DataFrame> {
    let mut all_empty: Option<BooleanChunked> = None;
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let empty: BooleanChunked = match series.str() {
            Ok(strings) => strings
                .into_iter()
                .map(|value| value.map_or(true, str::is_empty))
                .collect(),
            Err(_) => series.is_null(),
        };
        all_empty = Some(match all_empty {
            Some(acc) => &acc & &empty,
            None => empty,
        });
    }

    match all_empty {
        Some(mask) => df.filter(&!mask),
        None => Ok(df),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_orders() -> Session {
        let mut session = Session::new();
        session.register(
            "orders",
            df!(
                "id" => [Some(1i64), None, Some(3)],
                "note" => [Some("x"), None, Some("")]
            )
            .unwrap(),
        );
        session
    }

    #[test]
    fn test_blank_sql_is_no_query() {
        let mut session = Session::new();
        assert_eq!(
            QueryExecutor.execute(&mut session, "  \n\t").unwrap_err(),
            QueryError::NoQuery
        );
    }

    #[test]
    fn test_all_null_rows_are_dropped_in_order() {
        let mut session = session_with_orders();
        let result = QueryExecutor
            .execute(&mut session, "SELECT id, note FROM orders")
            .unwrap();
        assert_eq!(result.columns, vec!["id", "note"]);
        assert_eq!(result.rows(), 2);
        assert_eq!(result.row_values(0).unwrap(), vec!["1", "x"]);
        assert_eq!(result.row_values(1).unwrap(), vec!["3", ""]);
    }

    #[test]
    fn test_rows_with_a_value_are_kept() {
        let df = df!(
            "a" => [Some(1i64), None],
            "b" => [None, Some("y")]
        )
        .unwrap();
        assert_eq!(drop_empty_rows(df).unwrap().height(), 2);
    }

    #[test]
    fn test_empty_string_only_row_dropped() {
        let df = df!("a" => ["", "z"], "b" => [None::<&str>, None]).unwrap();
        let kept = drop_empty_rows(df).unwrap();
        assert_eq!(kept.height(), 1);
    }

    #[test]
    fn test_pattern_like_column_names_are_plain_columns() {
        let mut session = Session::new();
        session.register(
            "t",
            df!(
                "^a.*$" => [Some(1i64), None],
                "abc" => [Some("x"), None]
            )
            .unwrap(),
        );
        let result = QueryExecutor
            .execute(&mut session, "SELECT * FROM t")
            .unwrap();
        assert_eq!(result.columns, vec!["^a.*$", "abc"]);
        assert_eq!(result.rows(), 1);

        let df = df!("*" => [Some(1i64), None], "b" => [None::<i64>, None]).unwrap();
        assert_eq!(drop_empty_rows(df).unwrap().height(), 1);
    }

    #[test]
    fn test_malformed_statement_returns_engine_error() {
        let mut session = session_with_orders();
        let err = QueryExecutor
            .execute(&mut session, "SELEC * FROM orders")
            .unwrap_err();
        assert!(matches!(err, QueryError::Engine(ref msg) if !msg.is_empty()));
        assert_eq!(session.tables(), vec!["orders"]);
    }

    #[test]
    fn test_unknown_table_is_engine_error() {
        let mut session = Session::new();
        assert!(matches!(
            QueryExecutor.execute(&mut session, "SELECT * FROM nowhere"),
            Err(QueryError::Engine(_))
        ));
    }

    #[test]
    fn test_count_returns_single_cell() {
        let mut session = session_with_orders();
        let result = QueryExecutor
            .execute(&mut session, "SELECT COUNT(*) AS n FROM orders")
            .unwrap();
        assert_eq!(result.rows(), 1);
        assert_eq!(result.columns.len(), 1);
    }
}
