//! Snapshot Reader (§4.2): reads the pre-image row an `UPDATE`/`DELETE` is about to touch,
//! using the *internal* handle so the read itself never re-enters the hook.
//!
//! `coerce_row` below is a trimmed descendant of `rainfrog`'s own `ValueParser`/`parse_value`
//! dispatch in `database/postgresql.rs` and `database/mysql.rs`: same "match on the column's
//! reported type name, `try_get::<T>` the narrow Rust type, stringify it" shape, but an audit
//! snapshot only needs enough fidelity to round-trip through JSON, not to render a table cell,
//! so the exotic branches (arrays, INET/CIDR, UUID, BYTEA hex-folding) are dropped.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, MySql, Pool, Postgres, Row, TypeInfo};

use crate::dialect::AuditDialect;
use crate::error::AuditResult;
use crate::event::WhereClause;

/// Per-dialect row coercion, the generic-over-`DB` seam `rainfrog`'s own root `database.rs`
/// draws with its own `ValueParser` trait.
pub trait RowCoercion: AuditDialect {
  fn row_to_map(row: &Self::Row) -> Map<String, Value>;
}

impl RowCoercion for Postgres {
  fn row_to_map(row: &PgRow) -> Map<String, Value> {
    let mut out = Map::new();
    for col in row.columns() {
      out.insert(col.name().to_string(), postgres_cell(row, col));
    }
    out
  }
}

impl RowCoercion for MySql {
  fn row_to_map(row: &MySqlRow) -> Map<String, Value> {
    let mut out = Map::new();
    for col in row.columns() {
      out.insert(col.name().to_string(), mysql_cell(row, col));
    }
    out
  }
}

fn postgres_cell(row: &PgRow, col: &sqlx::postgres::PgColumn) -> Value {
  let ord = col.ordinal();
  if row.try_get_raw(ord).is_ok_and(|v| v.is_null()) {
    return Value::Null;
  }
  match col.type_info().name().to_uppercase().as_str() {
    "BOOL" => row.try_get::<bool, usize>(ord).map(Value::Bool).unwrap_or(Value::Null),
    "INT2" | "SMALLINT" | "SMALLSERIAL" => row.try_get::<i16, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "INT4" | "INT" | "SERIAL" => row.try_get::<i32, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "INT8" | "BIGINT" | "BIGSERIAL" => row.try_get::<i64, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "FLOAT4" | "REAL" => row.try_get::<f32, usize>(ord).map(|f| Value::from(f as f64)).unwrap_or(Value::Null),
    "FLOAT8" | "DOUBLE PRECISION" => row.try_get::<f64, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "JSON" | "JSONB" => row.try_get::<Value, usize>(ord).unwrap_or(Value::Null),
    "TIMESTAMPTZ" => row
      .try_get::<DateTime<Utc>, usize>(ord)
      .map(|t| Value::String(t.to_rfc3339()))
      .unwrap_or(Value::Null),
    "TIMESTAMP" | "DATE" | "TIME" => {
      row.try_get::<String, usize>(ord).map(Value::String).unwrap_or(Value::Null)
    },
    _ => row.try_get::<String, usize>(ord).map(Value::String).unwrap_or(Value::Null),
  }
}

fn mysql_cell(row: &MySqlRow, col: &sqlx::mysql::MySqlColumn) -> Value {
  let ord = col.ordinal();
  if row.try_get_raw(ord).is_ok_and(|v| v.is_null()) {
    return Value::Null;
  }
  match col.type_info().name().to_uppercase().as_str() {
    "TINYINT(1)" | "BOOLEAN" | "BOOL" => row.try_get::<bool, usize>(ord).map(Value::Bool).unwrap_or(Value::Null),
    "TINYINT" | "SMALLINT" => row.try_get::<i16, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "INT" | "MEDIUMINT" => row.try_get::<i32, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "BIGINT" => row.try_get::<i64, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "FLOAT" => row.try_get::<f32, usize>(ord).map(|f| Value::from(f as f64)).unwrap_or(Value::Null),
    "DOUBLE" | "DECIMAL" => row.try_get::<f64, usize>(ord).map(Value::from).unwrap_or(Value::Null),
    "JSON" => row.try_get::<Value, usize>(ord).unwrap_or(Value::Null),
    "DATETIME" | "TIMESTAMP" => row
      .try_get::<DateTime<Utc>, usize>(ord)
      .map(|t| Value::String(t.to_rfc3339()))
      .unwrap_or(Value::Null),
    "DATE" | "TIME" => row.try_get::<String, usize>(ord).map(Value::String).unwrap_or(Value::Null),
    _ => row.try_get::<String, usize>(ord).map(Value::String).unwrap_or(Value::Null),
  }
}

/// The `id` column, parsed into the `table_row_id`/`resolved_row_id` every event carries.
/// Falls back to `0` when the row has no `id` column or it isn't an integer, mirroring the
/// original's best-effort `row_id` extraction rather than failing the whole round-trip over
/// a table with a non-standard primary key name.
fn row_id(map: &Map<String, Value>) -> u64 {
  map.get("id").and_then(Value::as_u64).unwrap_or(0)
}

/// Read the single row matched by `where_clause`, or `({}, 0)` when there is nothing to
/// snapshot (Select/Insert actions never reach this function; callers short-circuit per
/// §4.2 step 1).
pub async fn snapshot_row<DB>(pool: &Pool<DB>, where_clause: &WhereClause) -> AuditResult<(Map<String, Value>, u64)>
where
  DB: RowCoercion,
  for<'c> i64: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> String: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
{
  if where_clause.table.is_empty() || where_clause.column.is_empty() {
    return Ok((Map::new(), 0));
  }

  let placeholder = DB::placeholder(1);
  let sql = format!(
    "SELECT * FROM {} WHERE {} {} {}",
    where_clause.table, where_clause.column, where_clause.operator, placeholder
  );

  let query = sqlx::query(&sql);
  let query = match where_clause.bound_value.as_ref() {
    Some(crate::event::BindValue::I64(i)) => query.bind(*i),
    Some(other) => query.bind(other.to_bind_string()),
    None => query,
  };

  let row = query.fetch_optional(pool).await?;
  match row {
    Some(row) => {
      let map = DB::row_to_map(&row);
      let id = row_id(&map);
      Ok((map, id))
    },
    None => Ok((Map::new(), 0)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn row_id_falls_back_to_zero_without_an_id_column() {
    let map = Map::new();
    assert_eq!(row_id(&map), 0);
  }

  #[test]
  fn row_id_reads_integer_id() {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::from(42));
    assert_eq!(row_id(&map), 42);
  }
}
