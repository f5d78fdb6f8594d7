//! SQL safety gate.
//!
//! Decides whether a generated statement may be executed. The gate first
//! applies a syntactic check (read-query prefix plus a denylist of
//! modification/administrative keywords and separator/comment tokens), then,
//! unless disabled, parses the statement and allowlists only read-only query
//! shapes.
//!
//! This is a best-effort filter, not a security boundary: the executor also
//! opens dataset stores read-only.

mod parser;

pub use parser::{classify_sql, StatementClassifier};

use std::fmt;
use thiserror::Error;

/// Tokens that make a statement unacceptable, in the order they are checked.
///
/// Matching is a case-insensitive substring test, so a token is caught
/// regardless of position or surrounding characters.
pub const FORBIDDEN_TOKENS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "EXEC", "EXECUTE", "--",
    ";", "PRAGMA",
];

/// Keyword every accepted statement must start with.
pub const READ_KEYWORD: &str = "SELECT";

/// Why the gate refused a statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlRejection {
    /// Statement does not begin with SELECT.
    #[error("Security violation: Only SELECT statements are allowed.")]
    NotSelect,

    /// Statement contains a denylisted token.
    #[error("Security violation: Dangerous SQL pattern detected ({0}). Only read-only SELECT queries are permitted.")]
    ForbiddenToken(String),

    /// Statement could not be parsed.
    #[error("Security violation: Statement could not be verified as read-only ({0}).")]
    Unparseable(String),

    /// Statement parsed, but is not a single read-only query.
    #[error("Security violation: {0} statements are not permitted. Only read-only SELECT queries are permitted.")]
    NotReadOnly(StatementType),
}

/// The type of SQL statement detected by the parser check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Drop,
    Create,
    Alter,
    Pragma,
    Attach,
    /// More than one statement in the input.
    Multiple,
    /// Statement type could not be determined.
    Unknown,
}

impl StatementType {
    /// Returns true if executing this statement cannot change any data.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Create => write!(f, "CREATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Pragma => write!(f, "PRAGMA"),
            Self::Attach => write!(f, "ATTACH"),
            Self::Multiple => write!(f, "Multiple"),
            Self::Unknown => write!(f, "Unrecognized"),
        }
    }
}

/// Gate applied to every generated statement before execution.
#[derive(Debug, Clone)]
pub struct SqlGate {
    parse_check: bool,
}

impl Default for SqlGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlGate {
    /// Creates a gate with the parser check enabled.
    pub fn new() -> Self {
        Self { parse_check: true }
    }

    /// Enables or disables the parser-based allowlist stage.
    pub fn with_parse_check(mut self, enabled: bool) -> Self {
        self.parse_check = enabled;
        self
    }

    /// Checks a candidate statement, returning the first violation found.
    pub fn check(&self, sql: &str) -> Result<(), SqlRejection> {
        check_syntax(sql)?;

        if self.parse_check {
            let statement_type = classify_sql(sql)?;
            if !statement_type.is_read_only() {
                return Err(SqlRejection::NotReadOnly(statement_type));
            }
        }

        Ok(())
    }
}

/// Prefix and denylist check on the trimmed, case-folded statement.
pub fn check_syntax(sql: &str) -> Result<(), SqlRejection> {
    let upper = sql.trim().to_uppercase();

    if !upper.starts_with(READ_KEYWORD) {
        return Err(SqlRejection::NotSelect);
    }

    match FORBIDDEN_TOKENS.iter().find(|token| upper.contains(*token)) {
        Some(token) => Err(SqlRejection::ForbiddenToken((*token).to_string())),
        None => Ok(()),
    }
}
