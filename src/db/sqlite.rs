//! SQLite dataset store.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for file-backed SQLite stores using sqlx. Query connections are opened
//! read-only; only the importer opens a store for writing.

use crate::db::{
    ColumnKind, ColumnStats, ColumnSummary, DatabaseClient, DatabaseSummary, QueryResult, Row,
    TableSummary, Value,
};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default query timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Number of most frequent values reported for text columns.
const TOP_VALUES: i64 = 3;

/// Connections kept open per read-only store.
const READ_POOL_SIZE: u32 = 4;

/// Quotes an identifier for interpolation into SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite store client.
#[derive(Debug, Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    path: PathBuf,
    query_timeout: Duration,
}

impl SqliteClient {
    /// Opens an existing store read-only.
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(AskError::not_found(format!(
                "Dataset store not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(READ_POOL_SIZE)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                AskError::dataset(format!("Failed to open {}: {}", path.display(), e))
            })?;

        debug!("Opened {} read-only", path.display());
        Ok(Self {
            pool,
            path,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        })
    }

    /// Opens a store for writing, creating the file if needed.
    ///
    /// Uses a rollback journal so the closed store is a single file that can
    /// be renamed into place.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .journal_mode(SqliteJournalMode::Delete)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                AskError::dataset(format!("Failed to create {}: {}", path.display(), e))
            })?;

        Ok(Self {
            pool,
            path,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        })
    }

    /// Sets the deadline applied to each query.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Path of the backing store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops `table` if present and recreates it with the given columns and rows.
    ///
    /// Runs in a single transaction. `columns` pairs each name with its
    /// declared type.
    pub async fn replace_table(
        &self,
        table: &str,
        columns: &[(String, String)],
        rows: &[Row],
    ) -> Result<()> {
        if columns.is_empty() {
            return Err(AskError::invalid_input("CSV file has no columns"));
        }

        let quoted_table = quote_identifier(table);
        let column_defs = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty))
            .collect::<Vec<_>>()
            .join(", ");
        let column_names = columns
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table, column_names, placeholders
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted_table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", quoted_table, column_defs))
            .execute(&mut *tx)
            .await?;

        for row in rows {
            let mut query = sqlx::query(&insert);
            for value in row {
                query = match value {
                    Value::Null => query.bind(None::<String>),
                    Value::Int(i) => query.bind(*i),
                    Value::Float(f) => query.bind(*f),
                    Value::Text(s) => query.bind(s.clone()),
                    Value::Bytes(b) => query.bind(b.clone()),
                };
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!("Wrote {} rows into {}", rows.len(), table);
        Ok(())
    }

    /// Lists user tables in creation order.
    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskError::query(format!("Failed to fetch tables: {e}")))
    }

    async fn summarize_table(&self, table: &str) -> Result<TableSummary> {
        let quoted = quote_identifier(table);

        let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AskError::query(format!("Failed to count rows in {table}: {e}")))?;

        let columns: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AskError::query(format!("Failed to fetch columns for {table}: {e}"))
                })?;

        let mut summaries = Vec::with_capacity(columns.len());
        for (name, declared_type) in columns {
            let stats = match self.column_stats(&quoted, &name, &declared_type).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("Could not compute stats for {}.{}: {}", table, name, e);
                    ColumnStats::Unavailable
                }
            };
            summaries.push(ColumnSummary {
                name,
                declared_type,
                stats,
            });
        }

        Ok(TableSummary {
            name: table.to_string(),
            row_count,
            columns: summaries,
        })
    }

    async fn column_stats(
        &self,
        quoted_table: &str,
        column: &str,
        declared_type: &str,
    ) -> std::result::Result<ColumnStats, sqlx::Error> {
        let quoted_column = quote_identifier(column);

        match ColumnKind::from_declared(declared_type) {
            ColumnKind::Numeric => {
                let row = sqlx::query(&format!(
                    "SELECT MIN({c}), MAX({c}), AVG({c}) FROM {t}",
                    c = quoted_column,
                    t = quoted_table
                ))
                .fetch_one(&self.pool)
                .await?;

                let min = convert_value(&row, 0);
                let max = convert_value(&row, 1);
                let avg = match convert_value(&row, 2) {
                    Value::Int(i) => Some(i as f64),
                    Value::Float(f) => Some(f),
                    _ => None,
                };
                Ok(ColumnStats::numeric(&min, &max, avg))
            }
            ColumnKind::Text => {
                let rows = sqlx::query(&format!(
                    "SELECT {c}, COUNT(*) AS n FROM {t} WHERE {c} IS NOT NULL GROUP BY {c} ORDER BY n DESC LIMIT {limit}",
                    c = quoted_column,
                    t = quoted_table,
                    limit = TOP_VALUES
                ))
                .fetch_all(&self.pool)
                .await?;

                let values = rows
                    .iter()
                    .map(|row| {
                        let count = row.try_get::<i64, _>(1)?;
                        Ok((convert_value(row, 0).to_display_string(), count))
                    })
                    .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
                Ok(ColumnStats::TopValues { values })
            }
            ColumnKind::Other => Ok(ColumnStats::None),
        }
    }

    /// Column names of a statement that returned no rows.
    async fn describe_columns(&self, sql: &str) -> Vec<String> {
        match (&self.pool).prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn summarize(&self) -> Result<DatabaseSummary> {
        let mut tables = Vec::new();
        for name in self.fetch_table_names().await? {
            tables.push(self.summarize_table(&name).await?);
        }
        Ok(DatabaseSummary { tables })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                AskError::timeout(format!(
                    "Query exceeded {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| AskError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            None => self.describe_columns(sql).await,
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes one cell by its runtime storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_uppercase();

    match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

/// Strips sqlx's wrapper text so callers see the engine message.
fn format_query_error(error: sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn people_columns() -> Vec<(String, String)> {
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("name".to_string(), "TEXT".to_string()),
        ]
    }

    async fn seeded_store(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("people.db");
        let writer = SqliteClient::create(&path).await.unwrap();
        writer
            .replace_table(
                "people",
                &people_columns(),
                &[
                    vec![Value::Int(1), Value::from("Alice")],
                    vec![Value::Int(2), Value::from("Bob")],
                    vec![Value::Int(3), Value::from("Alice")],
                ],
            )
            .await
            .unwrap();
        writer.close().await.unwrap();
        path
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("sales"), "\"sales\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[tokio::test]
    async fn test_execute_select() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;
        let client = SqliteClient::open_read_only(&path).await.unwrap();

        let result = client
            .execute_query("SELECT * FROM people ORDER BY id LIMIT 2")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Int(1), Value::from("Alice")],
                vec![Value::Int(2), Value::from("Bob")],
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;
        let client = SqliteClient::open_read_only(&path).await.unwrap();

        let result = client
            .execute_query("SELECT name FROM people WHERE id > 100")
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["name"]);
    }

    #[tokio::test]
    async fn test_read_only_store_refuses_writes() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;
        let client = SqliteClient::open_read_only(&path).await.unwrap();

        let err = client
            .execute_query("DELETE FROM people")
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::Query(_)));

        let result = client
            .execute_query("SELECT COUNT(*) FROM people")
            .await
            .unwrap();
        assert_eq!(result.rows[0][0], Value::Int(3));
    }

    #[tokio::test]
    async fn test_unknown_column_surfaces_engine_text() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;
        let client = SqliteClient::open_read_only(&path).await.unwrap();

        let err = client
            .execute_query("SELECT emal FROM people")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such column"));
    }

    #[tokio::test]
    async fn test_summarize_reports_stats() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;
        let client = SqliteClient::open_read_only(&path).await.unwrap();

        let summary = client.summarize().await.unwrap();
        assert_eq!(summary.tables.len(), 1);

        let table = &summary.tables[0];
        assert_eq!(table.name, "people");
        assert_eq!(table.row_count, 3);
        assert_eq!(
            table.columns[0].stats,
            ColumnStats::Numeric {
                min: "1".to_string(),
                max: "3".to_string(),
                avg: Some(2.0),
            }
        );
        assert_eq!(
            table.columns[1].stats,
            ColumnStats::TopValues {
                values: vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)],
            }
        );
    }

    #[tokio::test]
    async fn test_real_column_stats_keep_decimal_point() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.db");
        let writer = SqliteClient::create(&path).await.unwrap();
        writer
            .replace_table(
                "prices",
                &[("p".to_string(), "REAL".to_string())],
                &[vec![Value::Float(1.0)], vec![Value::Float(3.0)]],
            )
            .await
            .unwrap();

        let summary = writer.summarize().await.unwrap();
        let stats = &summary.tables[0].columns[0].stats;
        assert_eq!(
            stats,
            &ColumnStats::Numeric {
                min: "1.0".to_string(),
                max: "3.0".to_string(),
                avg: Some(2.0),
            }
        );
        assert_eq!(stats.display(), "min=1.0, max=3.0, avg=2.00");
    }

    #[tokio::test]
    async fn test_replace_table_overwrites_previous_rows() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir).await;

        let writer = SqliteClient::create(&path).await.unwrap();
        writer
            .replace_table(
                "people",
                &people_columns(),
                &[vec![Value::Int(9), Value::Null]],
            )
            .await
            .unwrap();

        let result = writer.execute_query("SELECT * FROM people").await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(9), Value::Null]]);
    }

    #[tokio::test]
    async fn test_open_missing_store_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = SqliteClient::open_read_only(dir.path().join("missing.db"))
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::NotFound(_)));
    }
}
