//! Schema summary types for askql.
//!
//! A `DatabaseSummary` is produced once by the summarizer and then rendered
//! two ways: as prompt text for the model and as a structured `SchemaInfo`
//! for API responses. Neither rendering is ever parsed back.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::types::Value;

/// Declared column types that receive min/max/avg statistics.
const NUMERIC_TYPES: &[&str] = &["INTEGER", "REAL", "FLOAT", "DOUBLE", "BIGINT", "DECIMAL"];

/// Summary of every table in a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    /// Tables in creation order.
    pub tables: Vec<TableSummary>,
}

/// Summary of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    /// Table name.
    pub name: String,

    /// Number of rows at summary time.
    pub row_count: i64,

    /// Columns in declaration order.
    pub columns: Vec<ColumnSummary>,
}

/// Summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,

    /// Declared type as reported by the store (may be empty).
    pub declared_type: String,

    /// Statistics computed for this column.
    pub stats: ColumnStats,
}

/// Per-column statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    /// Numeric column: min, max and average (rendered with two decimals).
    Numeric {
        min: String,
        max: String,
        avg: Option<f64>,
    },
    /// Text column: up to three most frequent non-null values with counts.
    TopValues { values: Vec<(String, i64)> },
    /// Statistics query failed for this column.
    Unavailable,
    /// No statistics apply to this column type.
    None,
}

/// Statistics family a declared type falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Other,
}

impl ColumnKind {
    /// Classifies a declared SQLite column type.
    pub fn from_declared(declared_type: &str) -> Self {
        let upper = declared_type.trim().to_uppercase();
        if NUMERIC_TYPES.contains(&upper.as_str()) {
            Self::Numeric
        } else if upper == "TEXT" {
            Self::Text
        } else {
            Self::Other
        }
    }
}

impl ColumnStats {
    /// Builds numeric stats from raw aggregate values.
    pub fn numeric(min: &Value, max: &Value, avg: Option<f64>) -> Self {
        Self::Numeric {
            min: min.to_display_string(),
            max: max.to_display_string(),
            avg,
        }
    }

    /// Suffix appended to a column line in the prompt text.
    fn prompt_suffix(&self) -> Option<String> {
        match self {
            Self::Numeric { min, max, avg } => Some(format!(
                " | Stats: min={}, max={}, avg={:.2}",
                min,
                max,
                avg.unwrap_or(0.0)
            )),
            Self::TopValues { values } if values.is_empty() => None,
            Self::TopValues { values } => Some(format!(" | Top values: {}", format_top(values))),
            Self::Unavailable => Some(" | (Could not compute stats)".to_string()),
            Self::None => None,
        }
    }

    /// Human-readable statistics for API responses.
    pub fn display(&self) -> String {
        match self {
            Self::Numeric { min, max, avg } => format!(
                "min={}, max={}, avg={:.2}",
                min,
                max,
                avg.unwrap_or(0.0)
            ),
            Self::TopValues { values } if !values.is_empty() => {
                format!("Top values: {}", format_top(values))
            }
            Self::Unavailable => "Stats unavailable".to_string(),
            Self::TopValues { .. } | Self::None => "No stats available".to_string(),
        }
    }
}

fn format_top(values: &[(String, i64)]) -> String {
    values
        .iter()
        .map(|(value, count)| format!("'{}' ({}x)", value, count))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ColumnSummary {
    /// Maps the declared type onto the coarse type names used by API clients.
    pub fn frontend_type(&self) -> &'static str {
        let upper = self.declared_type.to_uppercase();
        match upper.as_str() {
            "INTEGER" | "BIGINT" | "REAL" | "FLOAT" | "DOUBLE" | "DECIMAL" => "number",
            "BOOLEAN" => "boolean",
            t if t.contains("DATE") || t.contains("TIME") => "date",
            _ => "string",
        }
    }
}

impl TableSummary {
    /// Structured description of this table.
    pub fn schema_info(&self) -> SchemaInfo {
        SchemaInfo {
            table_name: self.name.clone(),
            row_count: self.row_count,
            columns: self
                .columns
                .iter()
                .map(|column| SchemaInfoColumn {
                    name: column.name.clone(),
                    column_type: column.frontend_type().to_string(),
                    stats: column.stats.display(),
                })
                .collect(),
        }
    }
}

impl DatabaseSummary {
    /// Finds a table by name.
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Formats the summary for inclusion in the model prompt.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "Table '{}' ({} rows):", table.name, table.row_count);
            for column in &table.columns {
                let _ = write!(
                    out,
                    "  - Column '{}' (type: {})",
                    column.name, column.declared_type
                );
                if let Some(suffix) = column.stats.prompt_suffix() {
                    out.push_str(&suffix);
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Structured description for API responses.
    ///
    /// A single table is described in detail; several tables collapse into
    /// a union entry listing their names.
    pub fn schema_info(&self) -> SchemaInfo {
        match self.tables.as_slice() {
            [] => SchemaInfo {
                table_name: "no tables".to_string(),
                row_count: 0,
                columns: Vec::new(),
            },
            [table] => table.schema_info(),
            tables => SchemaInfo {
                table_name: format!("{} tables", tables.len()),
                row_count: tables.iter().map(|t| t.row_count).sum(),
                columns: vec![SchemaInfoColumn {
                    name: format!(
                        "Tables: {}",
                        tables
                            .iter()
                            .map(|t| t.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    column_type: "string".to_string(),
                    stats: "Multiple tables available".to_string(),
                }],
            },
        }
    }
}

/// Structured schema description returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub table_name: String,
    pub row_count: i64,
    pub columns: Vec<SchemaInfoColumn>,
}

/// One column in a `SchemaInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfoColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub stats: String,
}
