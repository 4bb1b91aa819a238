//! Transparent audit-trail interceptor for `sqlx`-backed relational database access.
//!
//! Wrap an application's own connection pool in an [`Auditor`] to get a pre-image/post-image
//! record of every audited `INSERT`/`UPDATE`/`DELETE`, written to its own audit table,
//! without the application code that issues the statement needing to know an audit trail
//! exists.

pub mod auditor;
pub mod compose;
pub mod context;
pub mod dialect;
pub mod error;
pub mod event;
pub mod parser;
pub mod snapshot;
pub mod writer;

pub use auditor::{AuditedOutcome, Auditor, AuditorBuilder, PreparedEvent};
pub use compose::ExecOutcome;
pub use context::{CancellationHandle, CancellationSignal, RequestContext};
pub use dialect::AuditDialect;
pub use error::{AuditError, AuditResult};
pub use event::{Action, BindValue, Event, WhereClause};
pub use parser::StatementParser;
