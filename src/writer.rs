//! Audit Writer (§4.5): the action-agnostic parameterized `INSERT` against the *internal*
//! pool, and the one-time `CREATE TABLE IF NOT EXISTS` bootstrap.
//!
//! Grounded in the acteon-audit Postgres store's `record()`: one `format!`-built SQL
//! string with numbered placeholders, one long `.bind()` chain, `execute()` against a
//! pool, map the `sqlx::Error` into this crate's own error type.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Pool;

use crate::dialect::AuditDialect;
use crate::error::AuditResult;
use crate::event::Event;

/// Create the audit table if it does not already exist. Callers typically do this once at
/// startup, against the internal pool.
pub async fn ensure_table<DB>(pool: &Pool<DB>, table: &str) -> AuditResult<()>
where
  DB: AuditDialect,
  for<'e> &'e Pool<DB>: sqlx::Executor<'e, Database = DB>,
{
  sqlx::query(&DB::create_table_sql(table)).execute(pool).await?;
  Ok(())
}

/// Write one [`Event`] to `table`. A no-op for exempted or `Select` events: callers are
/// expected to have already filtered those out (see [`crate::auditor::Auditor::execute`]),
/// but this function re-checks `is_exempted` defensively since writing a half-populated
/// exempted event would silently corrupt the audit trail.
pub async fn write_event<DB>(pool: &Pool<DB>, table: &str, event: &Event) -> AuditResult<()>
where
  DB: AuditDialect,
  for<'e> &'e Pool<DB>: sqlx::Executor<'e, Database = DB>,
  for<'c> i64: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> String: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> Value: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> DateTime<Utc>: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
{
  if event.is_exempted || matches!(event.action, crate::event::Action::Select) {
    return Ok(());
  }

  let sql = DB::insert_sql(table);

  sqlx::query(&sql)
    .bind(event.actor_id as i64)
    .bind(event.table_row_id as i64)
    .bind(event.table_name.clone())
    .bind(event.action.to_string())
    .bind(Value::Object(event.old_values.clone()))
    .bind(Value::Object(event.new_values.clone()))
    .bind(event.http_method.clone())
    .bind(event.url.clone())
    .bind(event.ip_address.clone())
    .bind(event.user_agent.clone())
    .bind(event.created_at)
    .execute(pool)
    .await?;

  Ok(())
}
