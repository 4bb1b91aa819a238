//! Driver Hook / `Auditor` (§4.4, §3 data model, §4.6 state machine).
//!
//! The original wraps a `database/sql` driver with `sqlhooks.Wrap` and registers the
//! result under a synthetic driver name (`RegisterHooks`, `store-hooks-{mysql,postgres}`).
//! `sqlx` has no driver registry to hook into, so the hook becomes an explicit method pair
//! on a concrete, generic-over-dialect struct instead: `before`/`after` bracket the
//! application's own `sqlx::query(...).execute(...)` call, the same shape `rainfrog`'s own
//! `Database::start_query` brackets a user-entered query with logging and result capture.

use log::{debug, error, info, trace, warn};
use sqlx::Pool;

use crate::compose::{compose_post, compose_pre, ExecOutcome};
use crate::context::RequestContext;
use crate::dialect::AuditDialect;
use crate::error::{AuditError, AuditResult};
use crate::event::Event;
use crate::parser::{ParsedStatement, StatementParser};
use crate::snapshot::RowCoercion;
use crate::writer::{ensure_table, write_event};

/// Builds an [`Auditor`]. Mirrors the original's functional options (`WithTableName`,
/// `WithTableException`) as plain builder methods, the idiom `rainfrog`'s own `Cli`
/// (clap-derived) and `Config` (serde-derived) modules favor over a `fn(&mut T)` option
/// type.
pub struct AuditorBuilder {
  table_name: String,
  table_exceptions: Vec<String>,
}

impl Default for AuditorBuilder {
  fn default() -> Self {
    Self { table_name: "audits".to_string(), table_exceptions: vec!["audits".to_string()] }
  }
}

impl AuditorBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Customize the audit table name. Non-alphanumeric characters are stripped, the same
  /// sanitisation the original's `WithTableName` applies before using the name in a SQL
  /// template.
  pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
    let sanitised = sanitise(&table_name.into());
    self.table_exceptions.push(sanitised.clone());
    self.table_name = sanitised;
    self
  }

  /// Add table names that should never be audited, beyond the audit table itself.
  pub fn table_exceptions<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.table_exceptions.extend(names.into_iter().map(|n| n.into().to_lowercase()));
    self
  }

  /// Build an auditor over two distinct pools: `hooked` is the pool application code runs
  /// its statements through, `internal` is the pool the Snapshot Reader and Audit Writer
  /// use for their own reads/writes. Keeping these separate is what stops a snapshot read
  /// or audit write from re-entering the hook (§4.4 design note); a single shared pool
  /// would recurse.
  pub async fn connect<DB>(self, hooked: Pool<DB>, internal: Pool<DB>) -> AuditResult<Auditor<DB>>
  where
    DB: AuditDialect + StatementParser + RowCoercion,
    for<'e> &'e Pool<DB>: sqlx::Executor<'e, Database = DB>,
  {
    if same_pool(&hooked, &internal) {
      return Err(AuditError::SamePool);
    }

    ensure_table(&internal, &self.table_name).await?;
    info!("{}: audit table {:?} ready", DB::dialect_label(), self.table_name);

    Ok(Auditor { hooked, internal, table_name: self.table_name, table_exceptions: self.table_exceptions })
  }
}

/// Best-effort guard against handing the hooked pool back in as the internal one: two
/// pool handles cloned from the same `Pool::connect` share the same `Arc`-backed
/// connection options.
fn same_pool<DB: sqlx::Database>(a: &Pool<DB>, b: &Pool<DB>) -> bool {
  std::sync::Arc::ptr_eq(&a.connect_options(), &b.connect_options())
}

fn sanitise(name: &str) -> String {
  name.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase()
}

/// Outcome of running the in-flight prepared event through to completion, returned by
/// [`Auditor::execute`] alongside whatever the application's own statement produced.
pub struct AuditedOutcome<T> {
  pub app_result: T,
  pub event: Event,
}

/// Pending state between [`Auditor::before`] and [`Auditor::after`], the Rust analogue of
/// stashing an `Event` on the request `context.Context` the way `Hooks::Before` does.
pub struct PreparedEvent {
  parsed: ParsedStatement,
  event: Event,
}

/// Internal bookkeeping mirroring the original's `Received -> Parsed -> (Exempt |
/// Snapshotted) -> Executed -> Audited -> Done` state machine. Exists purely so `before`,
/// `after`, and `execute` have something concrete to name in their log breadcrumbs and
/// `debug_assert!` checks; never exposed outside this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Received,
  Parsed,
  Exempt,
  Snapshotted,
  Executed,
  Audited,
  Done,
}

/// Races `fut` against the context's cancellation signal, if one was supplied. Covers the
/// three suspension points `execute` brackets (snapshot read inside `before`, the
/// application statement, the audit write inside `after`) uniformly.
async fn race<T>(ctx: &RequestContext, fut: impl std::future::Future<Output = AuditResult<T>>) -> AuditResult<T> {
  match ctx.cancellation.clone() {
    Some(mut signal) => {
      tokio::select! {
        result = fut => result,
        _ = signal.cancelled() => {
          warn!("audit round-trip cancelled mid-flight");
          Err(AuditError::Cancelled)
        },
      }
    },
    None => fut.await,
  }
}

/// A transparent audit-trail interceptor for one `sqlx::Database` backend, generic over
/// the dialect tag rather than over a boxed trait object (§9 design note: "a tagged
/// variant with a trait/interface, not by embedding both concrete parsers in one
/// container").
pub struct Auditor<DB: AuditDialect> {
  hooked: Pool<DB>,
  internal: Pool<DB>,
  table_name: String,
  table_exceptions: Vec<String>,
}

impl<DB> Auditor<DB>
where
  DB: AuditDialect + StatementParser + RowCoercion,
  for<'e> &'e Pool<DB>: sqlx::Executor<'e, Database = DB>,
  for<'c> i64: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> String: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> serde_json::Value: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
  for<'c> chrono::DateTime<chrono::Utc>: sqlx::Encode<'c, DB> + sqlx::Type<DB>,
{
  /// The pool application code should run its own statements through.
  pub fn hooked_pool(&self) -> &Pool<DB> {
    &self.hooked
  }

  pub fn dialect_label(&self) -> &'static str {
    DB::dialect_label()
  }

  /// `Before` (§4.4, §4.6 Received -> Parsed -> Exempt|Snapshotted): parse `query`,
  /// determine the target table and whether it is exempt, and (unless exempt) read the
  /// pre-image row the statement is about to touch.
  pub async fn before(&self, query: &str, args: &[crate::event::BindValue], ctx: &RequestContext) -> AuditResult<PreparedEvent> {
    trace!("{}: {:?} received statement", DB::dialect_label(), Phase::Received);

    let table = DB::get_table_name(query)?;
    let parsed = DB::parse(query)?;
    trace!("{}: {:?} table {:?}, action {:?}", DB::dialect_label(), Phase::Parsed, table, parsed.action);

    let mut event = compose_pre(&self.internal, &table, &parsed, args, &self.table_exceptions, ctx.actor_id).await?;
    event.http_method = ctx.http_method.clone();
    event.url = ctx.url.clone();
    event.ip_address = ctx.ip_address.clone();
    event.user_agent = ctx.user_agent.clone();

    if event.is_exempted {
      debug!("{}: {:?} table {:?} is exempt, skipping snapshot", DB::dialect_label(), Phase::Exempt, table);
    } else {
      debug_assert!(!event.table_name.is_empty(), "a non-exempt event must carry a resolved table name");
      trace!("{}: {:?} pre-image captured for table {:?}", DB::dialect_label(), Phase::Snapshotted, table);
    }

    Ok(PreparedEvent { parsed, event })
  }

  /// `After` (§4.4, §4.6 Snapshotted -> Executed -> Audited -> Done): fold the exec
  /// outcome into the prepared event's new-image, then write it unless exempt.
  pub async fn after(&self, prepared: PreparedEvent, args: &[crate::event::BindValue], outcome: ExecOutcome) -> AuditResult<Event> {
    trace!("{}: {:?} application statement finished", DB::dialect_label(), Phase::Executed);

    let event = compose_post(prepared.event, &prepared.parsed, args, &outcome);

    if event.is_exempted {
      debug!("{}: {:?} exempt event bypasses the audit writer", DB::dialect_label(), Phase::Done);
      return Ok(event);
    }

    debug_assert!(!matches!(event.action, crate::event::Action::Select), "Select statements must never reach the audit writer");

    write_event(&self.internal, &self.table_name, &event).await.inspect_err(|e| {
      error!("{}: failed writing audit event for table {:?}: {e}", DB::dialect_label(), event.table_name);
    })?;
    trace!("{}: {:?} audit row written for table {:?}", DB::dialect_label(), Phase::Audited, event.table_name);

    Ok(event)
  }

  /// Convenience wrapper running `before`, the application's own statement against the
  /// hooked pool, and `after` as one round-trip, the common case a caller without its own
  /// transaction-spanning needs reaches for. Each of the three suspension points (the
  /// snapshot read inside `before`, the application statement, the audit write inside
  /// `after`) is raced against [`RequestContext::cancellation`] via `tokio::select!`, so a
  /// cancellation firing mid-flight aborts whichever round-trip is in progress instead of
  /// only being checked once up front.
  pub async fn execute<F, Fut>(&self, query: &str, args: &[crate::event::BindValue], ctx: &RequestContext, run: F) -> AuditResult<AuditedOutcome<u64>>
  where
    F: FnOnce(&Pool<DB>) -> Fut,
    Fut: std::future::Future<Output = AuditResult<(u64, ExecOutcome)>>,
  {
    if ctx.is_cancelled() {
      return Err(AuditError::Cancelled);
    }

    let prepared = race(ctx, self.before(query, args, ctx)).await?;
    let (rows_affected, outcome) = race(ctx, run(&self.hooked)).await?;
    let event = race(ctx, self.after(prepared, args, outcome)).await?;

    Ok(AuditedOutcome { app_result: rows_affected, event })
  }
}
