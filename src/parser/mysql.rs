//! Dialect A: MySQL-family grammar, positional `?` placeholders.
//!
//! `rainfrog`'s own query preview already tokenizes MySQL statements with
//! `sqlparser::dialect::MySqlDialect` (see `database/mod.rs::get_dialect`); this reuses the
//! same dialect object. Because a bare
//! `?` placeholder carries no positional information of its own (unlike the vitess-sqlparser
//! named binds the original Go implementation walked), this implementation derives the
//! 1-based bind position *structurally*: for `UPDATE`, the N-th `SET` assignment consumes
//! the N-th placeholder and the trailing `WHERE` predicate consumes the next one; for
//! `DELETE`, the sole placeholder is the `WHERE` predicate; for `INSERT`, the column list and
//! `VALUES` tuple are positionally aligned. This is equivalent to counting `?` occurrences in
//! query order for every statement shape this crate supports (§9 non-goals exclude the
//! shapes where it wouldn't be).

use sqlx::MySql;

use super::{
  action_of, assignment_column, assignments_of, column_name, insert_columns_of, operator_str, parse_single_statement,
  selection_of, single_comparison, table_name_of, ParsedStatement, Predicate, SetAssignment, StatementParser,
};
use crate::dialect::AuditDialect;
use crate::error::{AuditError, AuditResult};
use crate::event::Action;

impl StatementParser for MySql {
  fn get_table_name(query: &str) -> AuditResult<String> {
    let dialect = MySql::sql_dialect();
    let stmt = parse_single_statement(dialect.as_ref(), query)?;
    Ok(table_name_of(&stmt))
  }

  fn parse(query: &str) -> AuditResult<ParsedStatement> {
    let dialect = MySql::sql_dialect();
    let stmt = parse_single_statement(dialect.as_ref(), query)?;
    let table = table_name_of(&stmt);
    let action = action_of(&stmt).ok_or_else(|| AuditError::InvalidQuery(format!("unrecognised statement: {query}")))?;

    let mut parsed = ParsedStatement::new(action, table);

    match action {
      Action::Insert => {
        parsed.insert_columns = insert_columns_of(&stmt);
      },
      Action::Update => {
        let assignments = assignments_of(&stmt);
        let mut set_list = Vec::with_capacity(assignments.len());
        for (i, assignment) in assignments.iter().enumerate() {
          set_list.push(SetAssignment { column: assignment_column(assignment)?, bind_position: i + 1 });
        }
        parsed.set_list = set_list;

        if let Some(expr) = selection_of(&stmt) {
          let (left, op, _right) = single_comparison(expr)?;
          parsed.predicate =
            Some(Predicate { column: column_name(left)?, operator: operator_str(op).to_string(), bind_position: set_list_len(&parsed) + 1 });
        }
      },
      Action::Delete => {
        if let Some(expr) = selection_of(&stmt) {
          let (left, op, _right) = single_comparison(expr)?;
          parsed.predicate = Some(Predicate { column: column_name(left)?, operator: operator_str(op).to_string(), bind_position: 1 });
        }
      },
      Action::Select => {},
    }

    Ok(parsed)
  }
}

fn set_list_len(parsed: &ParsedStatement) -> usize {
  parsed.set_list.len()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_insert_columns() {
    let parsed = MySql::parse("INSERT INTO users (email, name) VALUES (?, ?)").unwrap();
    assert_eq!(parsed.action, Action::Insert);
    assert_eq!(parsed.table, "users");
    assert_eq!(parsed.insert_columns, vec!["email".to_string(), "name".to_string()]);
  }

  #[test]
  fn parses_update_set_and_where() {
    let parsed = MySql::parse("UPDATE users SET email = ? WHERE id = ?").unwrap();
    assert_eq!(parsed.table, "users");
    assert_eq!(parsed.set_list.len(), 1);
    assert_eq!(parsed.set_list[0].column, "email");
    assert_eq!(parsed.set_list[0].bind_position, 1);
    let predicate = parsed.predicate.unwrap();
    assert_eq!(predicate.column, "id");
    assert_eq!(predicate.operator, "=");
    assert_eq!(predicate.bind_position, 2);
  }

  #[test]
  fn parses_update_with_multiple_assignments() {
    let parsed = MySql::parse("UPDATE users SET email = ?, name = ? WHERE id = ?").unwrap();
    assert_eq!(parsed.set_list.len(), 2);
    assert_eq!(parsed.set_list[1].bind_position, 2);
    assert_eq!(parsed.predicate.unwrap().bind_position, 3);
  }

  #[test]
  fn parses_delete_where() {
    let parsed = MySql::parse("DELETE FROM users WHERE id = ?").unwrap();
    assert_eq!(parsed.table, "users");
    let predicate = parsed.predicate.unwrap();
    assert_eq!(predicate.column, "id");
    assert_eq!(predicate.bind_position, 1);
  }

  #[test]
  fn get_table_name_lowercases_and_strips_backticks() {
    assert_eq!(MySql::get_table_name("UPDATE `Users` SET email = ? WHERE id = ?").unwrap(), "users");
  }
}
