use thiserror::Error;

/// Errors surfaced by the auditing pipeline.
///
/// Every fallible operation in this crate returns `Result<T, AuditError>`. Variants map
/// 1:1 onto the error sentinels the original design exposed (`ErrInvalidDatabaseDriver`,
/// `ErrNoAuditSet`, `ErrInvalidQuery`, `ErrDriverNotSupported`, `ErrInvalidConnection`),
/// plus the ambient wrapping this crate needs around `sqlx`/`serde_json`.
#[derive(Debug, Error)]
pub enum AuditError {
  #[error("invalid database driver")]
  InvalidDatabaseDriver,

  #[error("no audit is set from the request context")]
  NoAuditSet,

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("unsupported predicate shape: {0}")]
  UnsupportedPredicate(String),

  #[error("database driver not supported")]
  DriverNotSupported,

  #[error("invalid database connection")]
  InvalidConnection,

  #[error("the hooked and internal pool must be distinct connections")]
  SamePool,

  #[error(transparent)]
  Sql(#[from] sqlx::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("audit round-trip cancelled")]
  Cancelled,
}

pub type AuditResult<T> = Result<T, AuditError>;
