//! Event Composer (§4.3): turns a [`ParsedStatement`] plus the caller's bind arguments into
//! a fully populated [`Event`], in two passes that mirror the original's `setEvent`
//! (pre-execution: exemption check + pre-image snapshot) and `Save`'s
//! `setNewInsertValues`/`setNewUpdateValues` (post-execution: new-image assembly).

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::Pool;

use crate::error::{AuditError, AuditResult};
use crate::event::{BindValue, Event, WhereClause};
use crate::parser::{ParsedStatement, Predicate};
use crate::snapshot::{snapshot_row, RowCoercion};

/// Outcome of actually executing the application's statement, handed to [`compose_post`].
/// `returning_id` is populated when the caller parsed a `RETURNING id` clause itself (see
/// §7's resolved Open Question on Dialect B insert ids); `last_insert_id` is Dialect A's
/// `LAST_INSERT_ID()`-style value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
  pub last_insert_id: Option<u64>,
  pub returning_id: Option<u64>,
}

impl ExecOutcome {
  fn insert_id(&self) -> u64 {
    self.returning_id.or(self.last_insert_id).unwrap_or(0)
  }
}

/// Pre-execution pass: exemption check, then (for Update/Delete) the pre-image snapshot
/// read. Returns `Event::exempted()` immediately for an unrecognised or excluded table,
/// matching the original's "empty table name is always exempt" rule. Fails with
/// `AuditError::NoAuditSet` for a non-exempt table when the caller's `RequestContext`
/// carries no actor id, the Rust analogue of the original's missing `ctx.Value("audit")`
/// check; here there is no partially-initialized `Event` to be absent, so the signal is
/// "this statement has no one to attribute it to" instead.
pub async fn compose_pre<DB>(
  pool: &Pool<DB>,
  table: &str,
  parsed: &ParsedStatement,
  args: &[BindValue],
  table_exceptions: &[String],
  actor_id: Option<u64>,
) -> AuditResult<Event>
where
  DB: RowCoercion,
  for<'c> i64: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> String: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
{
  if is_exempted(table_exceptions, table) {
    return Ok(Event::exempted());
  }

  if actor_id.is_none() {
    return Err(AuditError::NoAuditSet);
  }

  let where_clause = predicate_where_clause(table, parsed.predicate.as_ref(), args);
  let (old_values, resolved_row_id) = snapshot_row(pool, &where_clause).await?;

  Ok(Event {
    actor_id: actor_id.unwrap_or(0),
    table_name: table.to_string(),
    table_row_id: resolved_row_id,
    action: parsed.action,
    old_values,
    where_clause: WhereClause { resolved_row_id, ..where_clause },
    ..Event::default()
  })
}

/// `""` and anything named in `table_exceptions` (case-sensitive; callers are expected to
/// have already lowercased, per [`crate::parser::table_name_of`]) are exempt.
fn is_exempted(table_exceptions: &[String], table: &str) -> bool {
  table.is_empty() || table_exceptions.iter().any(|t| t == table)
}

fn predicate_where_clause(table: &str, predicate: Option<&Predicate>, args: &[BindValue]) -> WhereClause {
  match predicate {
    Some(p) => WhereClause {
      table: table.to_string(),
      column: p.column.clone(),
      operator: p.operator.clone(),
      bound_value: args.get(p.bind_position.saturating_sub(1)).cloned(),
      resolved_row_id: 0,
    },
    None => WhereClause::default(),
  }
}

/// Post-execution pass: fill in `new_values` (and `table_row_id` for inserts), stamp
/// `created_at`. A no-op for exempted events and for `Select`, which never reaches the
/// Audit Writer.
pub fn compose_post(mut event: Event, parsed: &ParsedStatement, args: &[BindValue], outcome: &ExecOutcome) -> Event {
  if event.is_exempted {
    return event;
  }

  match parsed.action {
    crate::event::Action::Insert => {
      let mut new_values = zip_columns(&parsed.insert_columns, args);
      let id = outcome.insert_id();
      new_values.insert("id".to_string(), Value::from(id));
      event.table_row_id = id;
      event.new_values = new_values;
    },
    crate::event::Action::Update => {
      let mut new_values = Map::new();
      for assignment in &parsed.set_list {
        if let Some(value) = args.get(assignment.bind_position.saturating_sub(1)) {
          new_values.insert(assignment.column.clone(), value.to_json());
        }
      }
      if !event.where_clause.column.is_empty() {
        let bound = event.where_clause.bound_value.as_ref().map(BindValue::to_json).unwrap_or(Value::Null);
        new_values.insert(event.where_clause.column.clone(), bound);
      }
      event.new_values = new_values;
    },
    crate::event::Action::Delete => {
      event.new_values = Map::new();
    },
    crate::event::Action::Select => {},
  }

  event.created_at = Utc::now();
  event
}

fn zip_columns(columns: &[String], args: &[BindValue]) -> Map<String, Value> {
  let mut map = Map::new();
  for (column, value) in columns.iter().zip(args.iter()) {
    map.insert(column.clone(), value.to_json());
  }
  map
}
