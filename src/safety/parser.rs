//! Parser-based statement classification.
//!
//! Uses sqlparser-rs with the SQLite dialect to confirm that a statement is a
//! single query whose every reachable body is read-only.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use super::{SqlRejection, StatementType};

/// Parses SQL and reports the statement type it represents.
#[derive(Debug)]
pub struct StatementClassifier {
    dialect: SQLiteDialect,
}

impl Default for StatementClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementClassifier {
    /// Creates a new classifier.
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    /// Classifies a SQL string.
    ///
    /// Returns `StatementType::Select` only for a single statement that cannot
    /// modify data. Anything that fails to parse is an error, never a pass.
    pub fn classify(&self, sql: &str) -> Result<StatementType, SqlRejection> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| SqlRejection::Unparseable(e.to_string()))?;

        match statements.as_slice() {
            [] => Err(SqlRejection::Unparseable("empty statement".to_string())),
            [statement] => Ok(classify_statement(statement)),
            _ => Ok(StatementType::Multiple),
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> Result<StatementType, SqlRejection> {
    StatementClassifier::new().classify(sql)
}

/// Keeps the first non-read-only type seen.
fn worst(current: StatementType, next: StatementType) -> StatementType {
    if current.is_read_only() {
        next
    } else {
        current
    }
}

fn classify_statement(statement: &Statement) -> StatementType {
    match statement {
        Statement::Query(query) => classify_query(query),

        Statement::Insert { .. } => StatementType::Insert,
        Statement::Update { .. } => StatementType::Update,
        Statement::Delete { .. } => StatementType::Delete,
        Statement::Drop { .. } => StatementType::Drop,
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateVirtualTable { .. } => StatementType::Create,
        Statement::AlterTable { .. } => StatementType::Alter,
        Statement::Pragma { .. } => StatementType::Pragma,
        Statement::AttachDatabase { .. } => StatementType::Attach,

        _ => StatementType::Unknown,
    }
}

/// Inspects CTEs and the main body of a query.
fn classify_query(query: &Query) -> StatementType {
    let mut result = StatementType::Select;

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            result = worst(result, classify_query(&cte.query));
        }
    }

    worst(result, classify_set_expr(&query.body))
}

fn classify_set_expr(set_expr: &SetExpr) -> StatementType {
    match set_expr {
        SetExpr::Select(select) => classify_select(select),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            worst(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => StatementType::Select,
        SetExpr::Insert(_) => StatementType::Insert,
        SetExpr::Update(_) => StatementType::Update,
        #[allow(unreachable_patterns)]
        _ => StatementType::Unknown,
    }
}

/// Checks the FROM clause for derived tables.
fn classify_select(select: &Select) -> StatementType {
    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold(StatementType::Select, worst)
}

fn classify_table_with_joins(twj: &TableWithJoins) -> StatementType {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), worst)
}

fn classify_table_factor(factor: &TableFactor) -> StatementType {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => StatementType::Select,
    }
}
