//! Dialect B: PostgreSQL grammar, numbered `$N` placeholders.
//!
//! Unlike the bare `?` MySQL uses, a `$N` placeholder carries its own bind position in
//! the token text, so this implementation reads the number straight out of the
//! placeholder instead of deriving it structurally, the genuinely different
//! convention the two dialects described in §4.1 call for.

use sqlparser::ast::{Expr, Value};
use sqlx::Postgres;

use super::{
  action_of, assignment_column, assignments_of, column_name, insert_columns_of, operator_str, parse_single_statement,
  selection_of, single_comparison, table_name_of, ParsedStatement, Predicate, SetAssignment, StatementParser,
};
use crate::dialect::AuditDialect;
use crate::error::{AuditError, AuditResult};
use crate::event::Action;

impl StatementParser for Postgres {
  fn get_table_name(query: &str) -> AuditResult<String> {
    let dialect = Postgres::sql_dialect();
    let stmt = parse_single_statement(dialect.as_ref(), query)?;
    Ok(table_name_of(&stmt))
  }

  fn parse(query: &str) -> AuditResult<ParsedStatement> {
    let dialect = Postgres::sql_dialect();
    let stmt = parse_single_statement(dialect.as_ref(), query)?;
    let table = table_name_of(&stmt);
    let action = action_of(&stmt).ok_or_else(|| AuditError::InvalidQuery(format!("unrecognised statement: {query}")))?;

    let mut parsed = ParsedStatement::new(action, table);

    match action {
      Action::Insert => {
        parsed.insert_columns = insert_columns_of(&stmt);
      },
      Action::Update => {
        let mut set_list = Vec::new();
        for assignment in assignments_of(&stmt) {
          let position = placeholder_number(&assignment.value)?;
          set_list.push(SetAssignment { column: assignment_column(assignment)?, bind_position: position });
        }
        parsed.set_list = set_list;

        if let Some(expr) = selection_of(&stmt) {
          let (left, op, right) = single_comparison(expr)?;
          parsed.predicate = Some(Predicate {
            column: column_name(left)?,
            operator: operator_str(op).to_string(),
            bind_position: placeholder_number(right)?,
          });
        }
      },
      Action::Delete => {
        if let Some(expr) = selection_of(&stmt) {
          let (left, op, right) = single_comparison(expr)?;
          parsed.predicate = Some(Predicate {
            column: column_name(left)?,
            operator: operator_str(op).to_string(),
            bind_position: placeholder_number(right)?,
          });
        }
      },
      Action::Select => {},
    }

    Ok(parsed)
  }
}

/// Read the `N` out of a `$N` placeholder token, the Rust analogue of the original's
/// `rexpr.param_ref.number`.
fn placeholder_number(expr: &Expr) -> AuditResult<usize> {
  match expr {
    Expr::Value(Value::Placeholder(token)) => token
      .trim_start_matches('$')
      .parse::<usize>()
      .map_err(|_| AuditError::UnsupportedPredicate(format!("unparseable placeholder: {token}"))),
    other => Err(AuditError::UnsupportedPredicate(format!("expected a bind placeholder, got: {other}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_insert_columns() {
    let parsed = Postgres::parse("INSERT INTO users (email, name) VALUES ($1, $2)").unwrap();
    assert_eq!(parsed.action, Action::Insert);
    assert_eq!(parsed.insert_columns, vec!["email".to_string(), "name".to_string()]);
  }

  #[test]
  fn parses_update_set_and_where() {
    let parsed = Postgres::parse("UPDATE users SET email = $1 WHERE id = $2").unwrap();
    assert_eq!(parsed.set_list[0].column, "email");
    assert_eq!(parsed.set_list[0].bind_position, 1);
    let predicate = parsed.predicate.unwrap();
    assert_eq!(predicate.column, "id");
    assert_eq!(predicate.bind_position, 2);
  }

  #[test]
  fn parses_delete_where() {
    let parsed = Postgres::parse("DELETE FROM users WHERE id = $1").unwrap();
    let predicate = parsed.predicate.unwrap();
    assert_eq!(predicate.column, "id");
    assert_eq!(predicate.bind_position, 1);
  }

  #[test]
  fn bind_positions_need_not_be_in_textual_order() {
    // the $N convention lets the WHERE predicate reference an earlier-numbered arg
    // than a SET assignment -- exercised here to show dialect B derives position from
    // the token, not from structural order like dialect A does.
    let parsed = Postgres::parse("UPDATE users SET name = $2 WHERE id = $1").unwrap();
    assert_eq!(parsed.set_list[0].bind_position, 2);
    assert_eq!(parsed.predicate.unwrap().bind_position, 1);
  }
}
