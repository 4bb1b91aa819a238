use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of statement an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Select,
  Insert,
  Update,
  Delete,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Action::Select => "select",
      Action::Insert => "insert",
      Action::Update => "update",
      Action::Delete => "delete",
    };
    write!(f, "{s}")
  }
}

/// A caller-supplied bind argument. Stands in for "whatever type the application's own
/// driver layer uses", since this crate has no visibility into that type.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
  Null,
  Bool(bool),
  I64(i64),
  F64(f64),
  Text(String),
  Json(Value),
}

impl BindValue {
  /// Render this value the way it would appear in a JSON `old_values`/`new_values` map.
  pub fn to_json(&self) -> Value {
    match self {
      BindValue::Null => Value::Null,
      BindValue::Bool(b) => Value::Bool(*b),
      BindValue::I64(i) => Value::from(*i),
      BindValue::F64(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
      BindValue::Text(s) => Value::String(s.clone()),
      BindValue::Json(v) => v.clone(),
    }
  }

  /// Render as a string, the way the snapshot reader coerces row cells.
  pub fn to_bind_string(&self) -> String {
    match self {
      BindValue::Null => String::new(),
      BindValue::Bool(b) => b.to_string(),
      BindValue::I64(i) => i.to_string(),
      BindValue::F64(f) => f.to_string(),
      BindValue::Text(s) => s.clone(),
      BindValue::Json(v) => v.to_string(),
    }
  }
}

impl From<&str> for BindValue {
  fn from(s: &str) -> Self {
    BindValue::Text(s.to_string())
  }
}

impl From<String> for BindValue {
  fn from(s: String) -> Self {
    BindValue::Text(s)
  }
}

impl From<i64> for BindValue {
  fn from(v: i64) -> Self {
    BindValue::I64(v)
  }
}

impl From<u64> for BindValue {
  fn from(v: u64) -> Self {
    BindValue::I64(v as i64)
  }
}

/// The resolved single-column equality predicate driving the snapshot `SELECT`.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
  pub table: String,
  pub column: String,
  pub operator: String,
  pub bound_value: Option<BindValue>,
  pub resolved_row_id: u64,
}

/// One record per audited mutation.
#[derive(Debug, Clone)]
pub struct Event {
  pub actor_id: u64,
  pub table_name: String,
  pub table_row_id: u64,
  pub action: Action,
  pub old_values: Map<String, Value>,
  pub new_values: Map<String, Value>,
  pub http_method: String,
  pub url: String,
  pub ip_address: String,
  pub user_agent: String,
  pub created_at: DateTime<Utc>,

  // transient, only meaningful during composition
  pub where_clause: WhereClause,
  pub is_exempted: bool,
}

impl Default for Event {
  fn default() -> Self {
    Self {
      actor_id: 0,
      table_name: String::new(),
      table_row_id: 0,
      action: Action::Select,
      old_values: Map::new(),
      new_values: Map::new(),
      http_method: String::new(),
      url: String::new(),
      ip_address: String::new(),
      user_agent: String::new(),
      created_at: Utc::now(),
      where_clause: WhereClause::default(),
      is_exempted: false,
    }
  }
}

impl Event {
  /// The sentinel "exempted" event: no snapshot was taken, nothing will be written.
  pub fn exempted() -> Self {
    Self { is_exempted: true, ..Self::default() }
  }
}
