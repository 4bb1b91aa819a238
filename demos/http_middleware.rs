//! Framework-agnostic analogue of the original `middleware.Audit` `net/http` handler: build
//! a [`RequestContext`] from inbound request data and carry it through to the statement
//! that needs auditing. Any web framework's request type can feed `from_headers`; no
//! framework crate is a dependency of this demo on purpose, since an audited statement is
//! usually several layers below the HTTP handler that received the request.

use sqlaudit::RequestContext;

/// Stand-in for whatever header map a real framework hands a middleware layer.
struct InboundRequest {
  method: String,
  url: String,
  remote_addr: String,
  user_agent: String,
  actor_id: Option<u64>,
}

/// The Rust analogue of `middleware.Audit`'s `getUserID`/`readUserIP` extraction: prefer
/// `X-Real-Ip`, then `X-Forwarded-For`, then fall back to the connection's own address.
fn context_from_request(req: &InboundRequest, forwarded_for: Option<&str>, real_ip: Option<&str>) -> RequestContext {
  let ip_address = real_ip.or(forwarded_for).unwrap_or(&req.remote_addr).to_string();

  RequestContext::new(req.actor_id).with_envelope(req.method.clone(), req.url.clone(), ip_address, req.user_agent.clone())
}

#[tokio::main]
async fn main() {
  let req = InboundRequest {
    method: "PATCH".to_string(),
    url: "/api/v1/users/42".to_string(),
    remote_addr: "10.0.0.7:54321".to_string(),
    user_agent: "curl/8.4.0".to_string(),
    actor_id: Some(7),
  };

  let ctx = context_from_request(&req, Some("203.0.113.5"), None);

  println!(
    "audit context: actor={:?} method={} url={} ip={} agent={}",
    ctx.actor_id, ctx.http_method, ctx.url, ctx.ip_address, ctx.user_agent
  );

  // A real handler would now do something like:
  //
  //   let args = vec![BindValue::from("ada@example.com"), BindValue::from(42_i64)];
  //   auditor
  //     .execute("UPDATE users SET email = ? WHERE id = ?", &args, &ctx, |pool| async move {
  //       let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
  //         .bind("ada@example.com")
  //         .bind(42_i64)
  //         .execute(pool)
  //         .await?;
  //       Ok((result.rows_affected(), ExecOutcome::default()))
  //     })
  //     .await?;
}
