//! Error types for askql.
//!
//! Defines the main error enum used throughout the application and how each
//! kind maps onto an HTTP status.

use thiserror::Error;

use crate::safety::SqlRejection;

/// Fixed message returned when the model declines a non-data question.
pub const DECLINED_MESSAGE: &str = "I'm sorry, I can only answer questions related to the data. Please ask a question about the database content.";

/// Fixed message returned once the cost cap has been reached.
pub const BUDGET_EXHAUSTED_MESSAGE: &str = "Daily cost cap reached. Please try again tomorrow.";

/// Main error type for askql operations.
#[derive(Error, Debug)]
pub enum AskError {
    /// Client input errors (missing file, wrong extension, missing question, etc.)
    #[error("{0}")]
    InvalidInput(String),

    /// The model answered with the sentinel token: not a data question.
    #[error("{}", DECLINED_MESSAGE)]
    Declined,

    /// The SQL gate refused the generated statement.
    #[error("{0}")]
    Rejected(#[from] SqlRejection),

    /// Missing or wrong administrative credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A named dataset does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The running cost estimate reached the configured cap.
    #[error("{}", BUDGET_EXHAUSTED_MESSAGE)]
    BudgetExhausted,

    /// LLM API errors (auth, transport, malformed responses, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Query execution errors (unknown column, type mismatch, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// A completion or query ran past its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Dataset storage errors (import, sidecar files, store files).
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskError {
    /// Creates an invalid-input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an unauthorized error with the given message.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Creates a not-found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a dataset error with the given message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "Invalid Input",
            Self::Declined => "Declined",
            Self::Rejected(_) => "Security Violation",
            Self::Unauthorized(_) => "Unauthorized",
            Self::NotFound(_) => "Not Found",
            Self::BudgetExhausted => "Budget Exhausted",
            Self::Llm(_) => "LLM Error",
            Self::Query(_) => "Query Error",
            Self::Timeout(_) => "Timeout",
            Self::Dataset(_) => "Dataset Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::Declined => 400,
            Self::Unauthorized(_) => 401,
            Self::Rejected(_) => 403,
            Self::NotFound(_) => 404,
            Self::BudgetExhausted => 429,
            Self::Timeout(_) => 504,
            Self::Llm(_)
            | Self::Query(_)
            | Self::Dataset(_)
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Returns true for failures on our side or upstream (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<sqlx::Error> for AskError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<std::io::Error> for AskError {
    fn from(e: std::io::Error) -> Self {
        Self::Dataset(e.to_string())
    }
}

/// Result type alias using AskError.
pub type Result<T> = std::result::Result<T, AskError>;
