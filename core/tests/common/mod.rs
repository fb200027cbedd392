// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use stockguard::{
  BatchDispatcher, CoordinatorSettings, IsolationLevel, MemorySink, MemoryStore, MemoryStoreOptions, OrderProcessor,
  OrderRequest, PlanError, RetryPolicy, StepControl, StepHandler, StepState, TransactionCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// --- Plain plan state for engine-level tests ---
#[derive(Clone, Debug, Default)]
pub struct TestState {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub halt_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("plan error: {0}")]
  Plan(String),

  #[error("test handler failed: {0}")]
  Handler(String),
}

impl From<PlanError> for TestError {
  fn from(pe: PlanError) -> Self {
    TestError::Plan(format!("{:?}", pe))
  }
}

pub fn recording_handler(step_name: &'static str, message: &'static str) -> StepHandler<TestState, TestError> {
  Box::new(move |state: StepState<TestState>| {
    Box::pin(async move {
      let mut guard = state.write();
      guard.counter += 1;
      guard.message.push_str(message);
      guard.steps_executed.push(step_name.to_string());
      if guard.halt_at.as_deref() == Some(step_name) {
        return Ok(StepControl::Halt);
      }
      Ok(StepControl::Continue)
    })
  })
}

// --- Store and pipeline builders ---
pub fn seeded_store(products: &[(&str, i64)]) -> MemoryStore {
  seeded_store_with(MemoryStoreOptions::default(), products)
}

pub fn seeded_store_with(options: MemoryStoreOptions, products: &[(&str, i64)]) -> MemoryStore {
  let store = MemoryStore::with_options(options);
  for (name, quantity) in products {
    store.create_product(name, *quantity).expect("seed product");
  }
  store
}

pub fn coordinator(store: &MemoryStore, isolation: IsolationLevel) -> TransactionCoordinator {
  TransactionCoordinator::new(
    Arc::new(store.clone()),
    CoordinatorSettings::default().isolation(isolation),
  )
}

pub struct Harness {
  pub store: MemoryStore,
  pub sink: Arc<MemorySink>,
  pub dispatcher: BatchDispatcher,
}

pub fn harness(store: MemoryStore, settings: CoordinatorSettings, retry: RetryPolicy) -> Harness {
  let sink = Arc::new(MemorySink::new());
  let coordinator = TransactionCoordinator::new(Arc::new(store.clone()), settings);
  let processor = OrderProcessor::new(Arc::new(coordinator))
    .with_retry(retry)
    .with_sink(sink.clone());
  Harness {
    store,
    sink,
    dispatcher: BatchDispatcher::new(Arc::new(processor)),
  }
}

/// Retry policy generous enough for a fully contended batch to drain.
pub fn patient_retry() -> RetryPolicy {
  RetryPolicy::builder()
    .max_retries(100)
    .initial_delay(Duration::from_millis(1))
    .max_delay(Duration::from_millis(20))
    .build()
}

pub fn orders(count: usize, product: &str, quantity: i64) -> Vec<OrderRequest> {
  (0..count)
    .map(|i| OrderRequest::new(format!("Order {}", i), product, quantity))
    .collect()
}

// --- Tracing setup, once per test binary ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
