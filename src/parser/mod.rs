//! SQL Dialect Parser (§4.1): turns a raw parameterized statement into a
//! [`ParsedStatement`]. Two concrete implementations live in [`mysql`] and [`postgres`];
//! both ride on the `sqlparser` crate's AST (the same crate `rainfrog` already depends on
//! for its own query preview/confirmation logic), differing in how a bind
//! placeholder's 1-based position is derived; see the module docs on each.

pub mod mysql;
pub mod postgres;

use sqlparser::ast::{
  Assignment, AssignmentTarget, BinaryOperator, Expr, FromTable, Insert, ObjectName, Statement, TableFactor,
  TableWithJoins,
};
use sqlparser::dialect::Dialect;
use sqlparser::parser::Parser;

use crate::error::{AuditError, AuditResult};
use crate::event::Action;

/// A single `column OP bind_ref` comparison extracted from a `WHERE` clause.
#[derive(Debug, Clone)]
pub struct Predicate {
  pub column: String,
  pub operator: String,
  pub bind_position: usize,
}

/// A single `column = bind_ref` assignment extracted from an `UPDATE ... SET` list.
#[derive(Debug, Clone)]
pub struct SetAssignment {
  pub column: String,
  pub bind_position: usize,
}

/// Dialect-agnostic view of a user query, per §3 `ParsedStatement`.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
  pub action: Action,
  pub table: String,
  pub insert_columns: Vec<String>,
  pub set_list: Vec<SetAssignment>,
  pub predicate: Option<Predicate>,
}

impl ParsedStatement {
  fn new(action: Action, table: String) -> Self {
    Self { action, table, insert_columns: Vec::new(), set_list: Vec::new(), predicate: None }
  }
}

/// Parse `query` with `dialect` into exactly one top-level statement. Multiple
/// statements in one string, or an empty/unparseable string, are rejected, the same
/// "only one statement allowed per query" discipline `rainfrog`'s own
/// `get_first_query` enforces.
pub(crate) fn parse_single_statement(dialect: &dyn Dialect, query: &str) -> AuditResult<Statement> {
  let mut ast = Parser::parse_sql(dialect, query).map_err(|e| AuditError::InvalidQuery(e.to_string()))?;
  match ast.len() {
    0 => Err(AuditError::InvalidQuery("parsed query is empty".to_string())),
    1 => Ok(ast.remove(0)),
    _ => Err(AuditError::InvalidQuery("only one statement allowed per query".to_string())),
  }
}

/// `get_table_name` (§4.1): the lowercase, backtick/quote-stripped bare identifier of
/// the statement's target table. Returns `""` for statement kinds outside
/// Select/Insert/Update/Delete, matching the original's "no error, empty name" contract.
pub(crate) fn table_name_of(stmt: &Statement) -> String {
  let name = match stmt {
    Statement::Insert(Insert { table_name, .. }) => Some(table_name),
    Statement::Update { table, .. } => table_relation_name(table),
    Statement::Delete(delete) => match &delete.from {
      FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
        tables.first().and_then(table_relation_name)
      },
    },
    Statement::Query(query) => select_from_name(query),
    _ => None,
  };
  name.map(|n| bare_identifier(n)).unwrap_or_default()
}

fn table_relation_name(table: &TableWithJoins) -> Option<&ObjectName> {
  match &table.relation {
    TableFactor::Table { name, .. } => Some(name),
    _ => None,
  }
}

fn select_from_name(query: &sqlparser::ast::Query) -> Option<&ObjectName> {
  if let sqlparser::ast::SetExpr::Select(select) = query.body.as_ref() {
    select.from.first().and_then(table_relation_name)
  } else {
    None
  }
}

fn bare_identifier(name: &ObjectName) -> String {
  name.0.last().map(|ident| ident.value.trim_matches(['`', '"', '\'']).to_lowercase()).unwrap_or_default()
}

pub(crate) fn action_of(stmt: &Statement) -> Option<Action> {
  match stmt {
    Statement::Insert(_) => Some(Action::Insert),
    Statement::Update { .. } => Some(Action::Update),
    Statement::Delete(_) => Some(Action::Delete),
    Statement::Query(_) => Some(Action::Select),
    _ => None,
  }
}

pub(crate) fn insert_columns_of(stmt: &Statement) -> Vec<String> {
  match stmt {
    Statement::Insert(Insert { columns, .. }) => columns.iter().map(|i| i.value.to_lowercase()).collect(),
    _ => Vec::new(),
  }
}

pub(crate) fn assignments_of(stmt: &Statement) -> &[Assignment] {
  match stmt {
    Statement::Update { assignments, .. } => assignments,
    _ => &[],
  }
}

pub(crate) fn assignment_column(assignment: &Assignment) -> AuditResult<String> {
  match &assignment.target {
    AssignmentTarget::ColumnName(name) => Ok(bare_identifier(name)),
    AssignmentTarget::Tuple(_) => {
      Err(AuditError::UnsupportedPredicate("tuple assignment targets are not supported".to_string()))
    },
  }
}

pub(crate) fn selection_of(stmt: &Statement) -> Option<&Expr> {
  match stmt {
    Statement::Update { selection, .. } => selection.as_ref(),
    Statement::Delete(delete) => delete.selection.as_ref(),
    _ => None,
  }
}

/// Require the predicate to be a single `column OP bind_ref` comparison, per §4.1/§9
/// ("multi-predicate WHERE, OR branches, subqueries, and IN are unsupported").
pub(crate) fn single_comparison(expr: &Expr) -> AuditResult<(&Expr, &BinaryOperator, &Expr)> {
  match expr {
    Expr::BinaryOp { left, op, right } if is_comparison(op) => Ok((left, op, right)),
    Expr::BinaryOp { op: BinaryOperator::And, .. } | Expr::BinaryOp { op: BinaryOperator::Or, .. } => {
      Err(AuditError::UnsupportedPredicate("multi-predicate WHERE clauses are not supported".to_string()))
    },
    Expr::InList { .. } | Expr::InSubquery { .. } => {
      Err(AuditError::UnsupportedPredicate("IN predicates are not supported".to_string()))
    },
    Expr::Nested(inner) => single_comparison(inner),
    other => Err(AuditError::UnsupportedPredicate(format!("unsupported WHERE shape: {other}"))),
  }
}

fn is_comparison(op: &BinaryOperator) -> bool {
  matches!(
    op,
    BinaryOperator::Eq
      | BinaryOperator::NotEq
      | BinaryOperator::Lt
      | BinaryOperator::Gt
      | BinaryOperator::LtEq
      | BinaryOperator::GtEq
  )
}

pub(crate) fn operator_str(op: &BinaryOperator) -> &'static str {
  match op {
    BinaryOperator::Eq => "=",
    BinaryOperator::NotEq => "!=",
    BinaryOperator::Lt => "<",
    BinaryOperator::Gt => ">",
    BinaryOperator::LtEq => "<=",
    BinaryOperator::GtEq => ">=",
    _ => "=",
  }
}

pub(crate) fn column_name(expr: &Expr) -> AuditResult<String> {
  match expr {
    Expr::Identifier(ident) => Ok(ident.value.to_lowercase()),
    Expr::CompoundIdentifier(parts) => {
      Ok(parts.last().map(|i| i.value.to_lowercase()).unwrap_or_default())
    },
    other => Err(AuditError::UnsupportedPredicate(format!("expected a column reference, got: {other}"))),
  }
}

/// Per-dialect parser capability set (§9: "Two parser implementations behind a single
/// capability set"). Implemented once for each concrete `sqlx::Database` marker type.
pub trait StatementParser {
  /// `get_table_name` (§4.1).
  fn get_table_name(query: &str) -> AuditResult<String>;

  /// `parse` (§4.1): extract action, table, SET assignments (UPDATE only) and the
  /// WHERE predicate (UPDATE/DELETE only).
  fn parse(query: &str) -> AuditResult<ParsedStatement>;
}

#[cfg(test)]
mod tests {
  use sqlparser::dialect::MySqlDialect;

  use super::*;

  #[test]
  fn table_name_update() {
    let stmt = parse_single_statement(&MySqlDialect {}, "UPDATE `Users` SET email = ? WHERE id = ?").unwrap();
    assert_eq!(table_name_of(&stmt), "users");
  }

  #[test]
  fn table_name_insert() {
    let stmt = parse_single_statement(&MySqlDialect {}, "INSERT INTO users (email) VALUES (?)").unwrap();
    assert_eq!(table_name_of(&stmt), "users");
  }

  #[test]
  fn table_name_delete() {
    let stmt = parse_single_statement(&MySqlDialect {}, "DELETE FROM users WHERE id = ?").unwrap();
    assert_eq!(table_name_of(&stmt), "users");
  }

  #[test]
  fn table_name_select() {
    let stmt = parse_single_statement(&MySqlDialect {}, "SELECT * FROM users WHERE id = ?").unwrap();
    assert_eq!(table_name_of(&stmt), "users");
  }

  #[test]
  fn table_name_unrecognised_statement_is_empty() {
    let stmt = parse_single_statement(&MySqlDialect {}, "BEGIN").unwrap();
    assert_eq!(table_name_of(&stmt), "");
  }

  #[test]
  fn rejects_multiple_statements() {
    let err = parse_single_statement(&MySqlDialect {}, "SELECT 1; SELECT 2;").unwrap_err();
    assert!(matches!(err, AuditError::InvalidQuery(_)));
  }

  #[test]
  fn rejects_or_predicate() {
    let stmt = parse_single_statement(&MySqlDialect {}, "DELETE FROM users WHERE id = ? OR id = ?").unwrap();
    let expr = selection_of(&stmt).unwrap();
    assert!(matches!(single_comparison(expr), Err(AuditError::UnsupportedPredicate(_))));
  }

  #[test]
  fn rejects_in_predicate() {
    let stmt = parse_single_statement(&MySqlDialect {}, "DELETE FROM users WHERE id IN (?, ?)").unwrap();
    let expr = selection_of(&stmt).unwrap();
    assert!(matches!(single_comparison(expr), Err(AuditError::UnsupportedPredicate(_))));
  }
}
