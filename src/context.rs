use tokio::sync::watch;

/// The explicit per-call struct the Design Notes ask for in place of context-map string
/// keys (`ctx.Value("audit")`, `ctx.Value("userID")` in the Go original). Applications
/// build one of these per inbound request (typically from their own HTTP middleware) and
/// pass it to [`crate::Auditor::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  pub actor_id: Option<u64>,
  pub http_method: String,
  pub url: String,
  pub ip_address: String,
  pub user_agent: String,
  pub cancellation: Option<CancellationSignal>,
}

impl RequestContext {
  pub fn new(actor_id: Option<u64>) -> Self {
    Self { actor_id, ..Self::default() }
  }

  pub fn with_envelope(mut self, http_method: impl Into<String>, url: impl Into<String>, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
    self.http_method = http_method.into();
    self.url = url.into();
    self.ip_address = ip_address.into();
    self.user_agent = user_agent.into();
    self
  }

  pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
    self.cancellation = Some(signal);
    self
  }

  /// `true` once the caller-supplied cancellation signal has fired.
  pub fn is_cancelled(&self) -> bool {
    self.cancellation.as_ref().is_some_and(CancellationSignal::is_cancelled)
  }
}

/// A lightweight cancellation signal built on a `tokio::sync::watch` channel, so that
/// suspension points (snapshot read, app statement, audit write) can `tokio::select!`
/// against it without pulling in `tokio-util`'s `CancellationToken`.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
  rx: watch::Receiver<bool>,
}

impl CancellationSignal {
  pub fn new() -> (CancellationHandle, Self) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, Self { rx })
  }

  pub fn is_cancelled(&self) -> bool {
    *self.rx.borrow()
  }

  /// Waits until cancellation fires. Race this against a round-trip with `tokio::select!`.
  pub async fn cancelled(&mut self) {
    let _ = self.rx.wait_for(|c| *c).await;
  }
}

/// The caller-held half of a [`CancellationSignal`]; call `cancel()` to abort any
/// in-flight round-trip racing against the paired signal.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
  tx: watch::Sender<bool>,
}

impl CancellationHandle {
  pub fn cancel(&self) {
    let _ = self.tx.send(true);
  }
}
