//! End-to-end scenarios against a live backend, gated behind env vars so `cargo test`
//! stays hermetic by default. Run with:
//!
//!   DATABASE_URL=postgres://... cargo test --test integration -- --ignored postgres
//!   MYSQL_URL=mysql://...       cargo test --test integration -- --ignored mysql

use pretty_assertions::assert_eq;
use sqlaudit::{Action, AuditorBuilder, BindValue, ExecOutcome, RequestContext};
use sqlx::{MySql, Pool, Postgres};

async fn setup_users_table<DB>(pool: &Pool<DB>, create_users: &str)
where
  DB: sqlx::Database,
  for<'e> &'e Pool<DB>: sqlx::Executor<'e, Database = DB>,
{
  sqlx::query("DROP TABLE IF EXISTS users").execute(pool).await.unwrap();
  sqlx::query(create_users).execute(pool).await.unwrap();
  sqlx::query("DROP TABLE IF EXISTS audits").execute(pool).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL against a live Postgres instance"]
async fn postgres_insert_update_delete_round_trip() {
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
  let hooked = Pool::<Postgres>::connect(&url).await.unwrap();
  let internal = Pool::<Postgres>::connect(&url).await.unwrap();

  setup_users_table(
    &hooked,
    "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, email TEXT NOT NULL, name TEXT NOT NULL)",
  )
  .await;

  let auditor = AuditorBuilder::new().connect(hooked, internal).await.unwrap();
  let ctx = RequestContext::new(Some(1)).with_envelope("POST", "/api/users", "127.0.0.1", "integration-test");

  let insert_args = vec![BindValue::from("ada@example.com"), BindValue::from("Ada")];
  let insert = auditor
    .execute("INSERT INTO users (email, name) VALUES ($1, $2)", &insert_args, &ctx, |pool| async move {
      let row: (i64,) = sqlx::query_as("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id")
        .bind("ada@example.com")
        .bind("Ada")
        .fetch_one(pool)
        .await?;
      Ok((1, ExecOutcome { last_insert_id: None, returning_id: Some(row.0 as u64) }))
    })
    .await
    .unwrap();

  assert_eq!(insert.event.action, Action::Insert);
  assert_eq!(insert.event.new_values.get("email").unwrap(), "ada@example.com");
  let user_id = insert.event.table_row_id;
  assert!(user_id > 0);

  let update_args = vec![BindValue::from("ada2@example.com"), BindValue::from(user_id as i64)];
  let update = auditor
    .execute("UPDATE users SET email = $1 WHERE id = $2", &update_args, &ctx, |pool| async move {
      let result = sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
        .bind("ada2@example.com")
        .bind(user_id as i64)
        .execute(pool)
        .await?;
      Ok((result.rows_affected(), ExecOutcome::default()))
    })
    .await
    .unwrap();

  assert_eq!(update.event.action, Action::Update);
  assert_eq!(update.event.old_values.get("email").unwrap(), "ada@example.com");
  assert_eq!(update.event.new_values.get("email").unwrap(), "ada2@example.com");

  let delete_args = vec![BindValue::from(user_id as i64)];
  let delete = auditor
    .execute("DELETE FROM users WHERE id = $1", &delete_args, &ctx, |pool| async move {
      let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id as i64).execute(pool).await?;
      Ok((result.rows_affected(), ExecOutcome::default()))
    })
    .await
    .unwrap();

  assert_eq!(delete.event.action, Action::Delete);
  assert!(delete.event.new_values.is_empty());
}

#[tokio::test]
#[ignore = "requires MYSQL_URL against a live MySQL instance"]
async fn mysql_insert_update_round_trip() {
  let url = std::env::var("MYSQL_URL").expect("MYSQL_URL must be set for this test");
  let hooked = Pool::<MySql>::connect(&url).await.unwrap();
  let internal = Pool::<MySql>::connect(&url).await.unwrap();

  setup_users_table(
    &hooked,
    "CREATE TABLE users (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, email VARCHAR(255) NOT NULL, name VARCHAR(255) NOT NULL)",
  )
  .await;

  let auditor = AuditorBuilder::new().connect(hooked, internal).await.unwrap();
  let ctx = RequestContext::new(Some(1)).with_envelope("POST", "/api/users", "127.0.0.1", "integration-test");

  let insert_args = vec![BindValue::from("grace@example.com"), BindValue::from("Grace")];
  let insert = auditor
    .execute("INSERT INTO users (email, name) VALUES (?, ?)", &insert_args, &ctx, |pool| async move {
      let result = sqlx::query("INSERT INTO users (email, name) VALUES (?, ?)")
        .bind("grace@example.com")
        .bind("Grace")
        .execute(pool)
        .await?;
      Ok((1, ExecOutcome { last_insert_id: Some(result.last_insert_id()), returning_id: None }))
    })
    .await
    .unwrap();

  assert_eq!(insert.event.action, Action::Insert);
  let user_id = insert.event.table_row_id;
  assert!(user_id > 0);

  let update_args = vec![BindValue::from("grace2@example.com"), BindValue::from(user_id as i64)];
  let update = auditor
    .execute("UPDATE users SET email = ? WHERE id = ?", &update_args, &ctx, |pool| async move {
      let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
        .bind("grace2@example.com")
        .bind(user_id as i64)
        .execute(pool)
        .await?;
      Ok((result.rows_affected(), ExecOutcome::default()))
    })
    .await
    .unwrap();

  assert_eq!(update.event.new_values.get("email").unwrap(), "grace2@example.com");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL against a live Postgres instance"]
async fn missing_actor_id_fails_before_executing() {
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
  let hooked = Pool::<Postgres>::connect(&url).await.unwrap();
  let internal = Pool::<Postgres>::connect(&url).await.unwrap();

  setup_users_table(&hooked, "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, email TEXT NOT NULL)").await;

  let auditor = AuditorBuilder::new().connect(hooked, internal).await.unwrap();
  let ctx = RequestContext::new(None);

  let args = vec![BindValue::from("nobody@example.com")];
  let result = auditor
    .execute("INSERT INTO users (email) VALUES ($1)", &args, &ctx, |pool| async move {
      let result = sqlx::query("INSERT INTO users (email) VALUES ($1)").bind("nobody@example.com").execute(pool).await?;
      Ok((result.rows_affected(), ExecOutcome::default()))
    })
    .await;

  assert!(matches!(result, Err(sqlaudit::AuditError::NoAuditSet)));

  let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(auditor.hooked_pool()).await.unwrap();
  assert_eq!(remaining.0, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL against a live Postgres instance"]
async fn exempted_table_produces_no_audit_row() {
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
  let hooked = Pool::<Postgres>::connect(&url).await.unwrap();
  let internal = Pool::<Postgres>::connect(&url).await.unwrap();

  sqlx::query("DROP TABLE IF EXISTS sessions").execute(&hooked).await.unwrap();
  sqlx::query("CREATE TABLE sessions (id BIGSERIAL PRIMARY KEY, token TEXT NOT NULL)").execute(&hooked).await.unwrap();
  sqlx::query("DROP TABLE IF EXISTS audits").execute(&hooked).await.unwrap();

  let auditor = AuditorBuilder::new().table_exceptions(["sessions"]).connect(hooked, internal).await.unwrap();
  let ctx = RequestContext::new(Some(1));

  let args = vec![BindValue::from("tok123")];
  let outcome = auditor
    .execute("INSERT INTO sessions (token) VALUES ($1)", &args, &ctx, |pool| async move {
      let result = sqlx::query("INSERT INTO sessions (token) VALUES ($1)").bind("tok123").execute(pool).await?;
      Ok((result.rows_affected(), ExecOutcome::default()))
    })
    .await
    .unwrap();

  assert!(outcome.event.is_exempted);
}
