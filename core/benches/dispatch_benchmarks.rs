use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stockguard::{
  BatchDispatcher, CoordinatorSettings, IsolationLevel, MemoryStore, OrderProcessor, OrderRequest, RetryPolicy,
  TransactionCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn dispatcher_for(store: &MemoryStore, isolation: IsolationLevel) -> BatchDispatcher {
  let coordinator = TransactionCoordinator::new(
    Arc::new(store.clone()),
    CoordinatorSettings::default().isolation(isolation),
  );
  let retry = RetryPolicy::builder()
    .max_retries(1_000)
    .initial_delay(Duration::from_micros(50))
    .max_delay(Duration::from_millis(2))
    .build();
  BatchDispatcher::new(Arc::new(OrderProcessor::new(Arc::new(coordinator)).with_retry(retry)))
}

// Spread over two rows, like the demo's generator.
fn batch(size: usize) -> Vec<OrderRequest> {
  (0..size)
    .map(|i| OrderRequest::new(format!("Order {}", i), if i % 2 == 0 { "a" } else { "b" }, 1))
    .collect()
}

fn bench_single_order(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let store = MemoryStore::new();
  store.create_product("a", i64::MAX / 2).unwrap();
  let coordinator = TransactionCoordinator::new(Arc::new(store), CoordinatorSettings::default());
  let request = OrderRequest::new("Order 0", "a", 1);

  c.bench_function("coordinator_single_order", |b| {
    b.to_async(&rt).iter(|| async {
      let outcome = coordinator.process_order(&request).await;
      criterion::black_box(outcome);
    })
  });
}

fn bench_batch_by_isolation(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let mut group = c.benchmark_group("dispatch_batch");
  let size = 100usize;
  group.throughput(Throughput::Elements(size as u64));

  for isolation in [
    IsolationLevel::ReadUncommitted,
    IsolationLevel::ReadCommitted,
    IsolationLevel::RepeatableRead,
    IsolationLevel::Serializable,
  ] {
    let store = MemoryStore::new();
    store.create_product("a", i64::MAX / 2).unwrap();
    store.create_product("b", i64::MAX / 2).unwrap();
    let dispatcher = dispatcher_for(&store, isolation);

    group.bench_with_input(BenchmarkId::from_parameter(isolation), &dispatcher, |b, dispatcher| {
      b.to_async(&rt).iter(|| async {
        let report = dispatcher.dispatch(batch(size)).await;
        criterion::black_box(report.summary);
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_single_order, bench_batch_by_isolation);
criterion_main!(benches);
