// core/examples/oversell_race.rs
//
// Runs the same over-subscribed batch under every isolation level against the
// in-memory store and prints what each level lets through.

use stockguard::{
  BatchDispatcher, CoordinatorSettings, IsolationLevel, MemoryStore, OrderProcessor, OrderRequest, RetryPolicy,
  TransactionCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  for isolation in [
    IsolationLevel::ReadUncommitted,
    IsolationLevel::ReadCommitted,
    IsolationLevel::RepeatableRead,
    IsolationLevel::Serializable,
  ] {
    let store = MemoryStore::new();
    if let Err(e) = store.create_product("a", 200) {
      eprintln!("seeding failed: {}", e);
      return;
    }

    // Every order holds its transaction open briefly, widening the race window.
    let coordinator = TransactionCoordinator::new(
      Arc::new(store.clone()),
      CoordinatorSettings::default()
        .isolation(isolation)
        .hold(Duration::from_millis(20)),
    );
    let processor = OrderProcessor::new(Arc::new(coordinator)).with_retry(
      RetryPolicy::builder()
        .max_retries(50)
        .initial_delay(Duration::from_millis(2))
        .build(),
    );
    let dispatcher = BatchDispatcher::new(Arc::new(processor));

    let requests = (0..30)
      .map(|i| OrderRequest::new(format!("Order {}", i), "a", 10).with_simulated_delay(true))
      .collect();
    let batch = dispatcher.dispatch(requests).await;

    let remaining = store.product("a").map_or(0, |p| p.quantity);
    info!(
      %isolation,
      committed = batch.summary.committed,
      rejected = batch.summary.rejected,
      failed = batch.summary.failed,
      remaining,
      ledger_rows = store.orders().len(),
      "batch done"
    );
  }
}
