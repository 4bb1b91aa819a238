use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use sqlx::{MySql, Postgres};

/// Capability set a concrete `sqlx::Database` backend must provide to be auditable.
///
/// Mirrors the design-note instruction to model dialect polymorphism as "a tagged
/// variant with a trait/interface, not by embedding both concrete parsers in one
/// container": here the tag *is* the `DB: AuditDialect` type parameter on
/// [`crate::Auditor`], resolved once at construction when the caller picks
/// `Auditor::<Postgres>` or `Auditor::<MySql>`.
pub trait AuditDialect: sqlx::Database {
  /// The general-purpose SQL parser dialect used to tokenize application statements.
  fn sql_dialect() -> Box<dyn Dialect + Send + Sync>;

  /// Diagnostic label, the direct descendant of the Go original's
  /// `store-hooks-{mysql,postgres}` driver-registration name. No registry exists in
  /// this crate; the label is used only for logging.
  fn dialect_label() -> &'static str;

  /// Render the 1-based `position`-th bind placeholder in this dialect's syntax.
  fn placeholder(position: usize) -> String;

  /// `CREATE TABLE IF NOT EXISTS` template for the audit table.
  fn create_table_sql(table: &str) -> String;

  /// Parameterized `INSERT` template; placeholders bound in the fixed column order
  /// documented on [`crate::writer`].
  fn insert_sql(table: &str) -> String;
}

impl AuditDialect for Postgres {
  fn sql_dialect() -> Box<dyn Dialect + Send + Sync> {
    Box::new(PostgreSqlDialect {})
  }

  fn dialect_label() -> &'static str {
    "audit-hooks-postgres"
  }

  fn placeholder(position: usize) -> String {
    format!("${position}")
  }

  fn create_table_sql(table: &str) -> String {
    format!(
      "CREATE TABLE IF NOT EXISTS {table} (
        id BIGSERIAL PRIMARY KEY,
        actor_id BIGINT NOT NULL,
        table_row_id BIGINT NOT NULL,
        table_name VARCHAR(255) NOT NULL,
        action VARCHAR(11) NOT NULL,
        old_values JSON NOT NULL,
        new_values JSON NOT NULL,
        http_method VARCHAR(11) NOT NULL,
        url TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
      )"
    )
  }

  fn insert_sql(table: &str) -> String {
    format!(
      "INSERT INTO {table} (actor_id, table_row_id, table_name, action, old_values, new_values, http_method, url, ip_address, user_agent, created_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    )
  }
}

impl AuditDialect for MySql {
  fn sql_dialect() -> Box<dyn Dialect + Send + Sync> {
    Box::new(MySqlDialect {})
  }

  fn dialect_label() -> &'static str {
    "audit-hooks-mysql"
  }

  fn placeholder(_position: usize) -> String {
    "?".to_string()
  }

  fn create_table_sql(table: &str) -> String {
    format!(
      "CREATE TABLE IF NOT EXISTS {table} (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        actor_id BIGINT UNSIGNED NOT NULL,
        table_row_id BIGINT UNSIGNED NOT NULL,
        table_name VARCHAR(255) NOT NULL,
        action VARCHAR(11) NOT NULL,
        old_values TEXT NOT NULL CHECK(json_valid(old_values)),
        new_values TEXT NOT NULL CHECK(json_valid(new_values)),
        http_method VARCHAR(11) NOT NULL,
        url TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        created_at DATETIME NOT NULL
      )"
    )
  }

  fn insert_sql(table: &str) -> String {
    format!(
      "INSERT INTO {table} (actor_id, table_row_id, table_name, action, old_values, new_values, http_method, url, ip_address, user_agent, created_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
  }
}
