//! CSV parsing and column type inference.

use crate::db::{Row, Value};
use crate::error::{AskError, Result};
use std::collections::{HashMap, HashSet};

/// Declared type for columns whose non-empty cells all parse as integers.
pub const INTEGER_TYPE: &str = "INTEGER";
/// Declared type for columns whose non-empty cells all parse as finite floats.
pub const REAL_TYPE: &str = "REAL";
/// Declared type for everything else, including all-empty columns.
pub const TEXT_TYPE: &str = "TEXT";

/// A parsed CSV file ready to be written into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    /// Column names paired with their inferred declared type.
    pub columns: Vec<(String, String)>,

    /// Typed rows, one value per column.
    pub rows: Vec<Row>,
}

impl ParsedCsv {
    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Integer,
    Real,
    Text,
}

impl Inferred {
    fn declared(self) -> &'static str {
        match self {
            Self::Integer => INTEGER_TYPE,
            Self::Real => REAL_TYPE,
            Self::Text => TEXT_TYPE,
        }
    }

    /// Narrows the type seen so far with one more non-empty cell.
    fn widen(self, cell: &str) -> Self {
        let cell = cell.trim();
        match self {
            Self::Integer if cell.parse::<i64>().is_ok() => Self::Integer,
            Self::Integer | Self::Real if parse_real(cell).is_some() => Self::Real,
            _ => Self::Text,
        }
    }
}

fn parse_real(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Parses CSV bytes with a header row.
///
/// Empty cells become NULL. Rows shorter than the header are padded with
/// NULL; rows longer than the header are rejected.
pub fn parse_csv(bytes: &[u8]) -> Result<ParsedCsv> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AskError::invalid_input(format!("Failed to parse CSV headers: {e}")))?
        .iter()
        .map(|s| s.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AskError::invalid_input("CSV file has no columns"));
    }
    let names = column_names(&headers);

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AskError::invalid_input(format!("Failed to parse CSV: {e}")))?;

        if record.len() > names.len() {
            return Err(AskError::invalid_input(format!(
                "Row {} has {} fields, expected at most {}",
                index + 2,
                record.len(),
                names.len()
            )));
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
            .collect();
        row.resize(names.len(), None);
        cells.push(row);
    }

    let types: Vec<Inferred> = (0..names.len())
        .map(|col| {
            let mut seen = None;
            for row in &cells {
                if let Some(cell) = &row[col] {
                    seen = Some(seen.unwrap_or(Inferred::Integer).widen(cell));
                }
            }
            seen.unwrap_or(Inferred::Text)
        })
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(cell, ty)| typed_value(cell, *ty))
                .collect()
        })
        .collect();

    Ok(ParsedCsv {
        columns: names
            .into_iter()
            .zip(&types)
            .map(|(name, ty)| (name, ty.declared().to_string()))
            .collect(),
        rows,
    })
}

fn typed_value(cell: Option<String>, ty: Inferred) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    match ty {
        Inferred::Integer => cell
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Inferred::Real => parse_real(cell.trim())
            .map(Value::Float)
            .unwrap_or(Value::Null),
        Inferred::Text => Value::Text(cell),
    }
}

/// Fills blank header names and disambiguates duplicates.
///
/// SQLite compares column names case-insensitively, so uniqueness is checked
/// on the lower-cased name. A suffix that collides with a real header is
/// bumped until it is free.
fn column_names(headers: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                header.clone()
            };
            let mut name = base.clone();
            let suffix = next_suffix.entry(base.to_lowercase()).or_insert(1);
            while used.contains(&name.to_lowercase()) {
                name = format!("{}.{}", base, suffix);
                *suffix += 1;
            }
            used.insert(name.to_lowercase());
            name
        })
        .collect()
}
