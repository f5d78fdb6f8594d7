//! Database layer for askql.
//!
//! Provides a trait-based interface over dataset stores, the SQLite
//! implementation, and the structured schema summary shared by the prompt
//! builder and the API responses.

mod schema;
mod sqlite;
mod types;

pub use schema::{
    ColumnKind, ColumnStats, ColumnSummary, DatabaseSummary, SchemaInfo, SchemaInfoColumn,
    TableSummary,
};
pub use sqlite::{quote_identifier, SqliteClient};
pub use types::{QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for dataset stores.
///
/// All operations are async and return Results with AskError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Describes every table with row counts and per-column statistics.
    async fn summarize(&self) -> Result<DatabaseSummary>;

    /// Executes a SQL query and returns the full result set.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection pool.
    async fn close(&self) -> Result<()>;
}
