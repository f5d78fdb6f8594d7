//! Offline execution-accuracy checks.
//!
//! An evaluation file is a JSON array of `{"question": ..., "query": ...}`
//! objects where `query` is a hand-written SQL statement known to answer the
//! question. Generated SQL counts as correct when it returns the same set of
//! rows as the gold query.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::{Row, Value};
use crate::error::{AskError, Result};

/// A question paired with a gold query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalCase {
    pub question: String,
    pub query: String,
}

/// Result of scoring one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub question: String,
    pub gold_sql: String,
    /// Absent when no statement was produced or it failed to run.
    pub generated_sql: Option<String>,
    pub correct: bool,
    pub error: Option<String>,
}

impl CaseOutcome {
    pub(crate) fn new(case: &EvalCase) -> Self {
        Self {
            question: case.question.clone(),
            gold_sql: case.query.clone(),
            generated_sql: None,
            correct: false,
            error: None,
        }
    }
}

/// Per-case outcomes of an evaluation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub outcomes: Vec<CaseOutcome>,
}

impl EvaluationReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn correct(&self) -> usize {
        self.outcomes.iter().filter(|o| o.correct).count()
    }

    /// Percentage of correct cases, 0 for an empty run.
    pub fn accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.correct() as f64 / self.total() as f64 * 100.0
    }
}

/// Reads evaluation cases from a JSON file.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let text = fs::read_to_string(path).map_err(|e| {
        AskError::invalid_input(format!(
            "Failed to read evaluation file {}: {e}",
            path.display()
        ))
    })?;
    parse_cases(&text)
}

pub fn parse_cases(text: &str) -> Result<Vec<EvalCase>> {
    serde_json::from_str(text)
        .map_err(|e| AskError::invalid_input(format!("Invalid evaluation file: {e}")))
}

/// Hashable stand-in for a cell.
///
/// Integers and whole floats share a key, so `COUNT(*)` and `SUM(x)` over
/// whole values compare equal.
#[derive(Debug, PartialEq, Eq, Hash)]
enum CellKey {
    Null,
    Int(i64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&Value> for CellKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Int(i) => Self::Int(*i),
            Value::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
            {
                Self::Int(*f as i64)
            }
            Value::Float(f) => Self::Float(f.to_bits()),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Bytes(b) => Self::Bytes(b.clone()),
        }
    }
}

fn row_set(rows: &[Row]) -> HashSet<Vec<CellKey>> {
    rows.iter()
        .map(|row| row.iter().map(CellKey::from).collect())
        .collect()
}

/// True when both results hold the same rows, ignoring order and duplicates.
pub fn same_rows(left: &[Row], right: &[Row]) -> bool {
    row_set(left) == row_set(right)
}
