// tests/memory_store_tests.rs
mod common;

use common::*;
use stockguard::{
  InventoryStore, IsolationLevel, MemoryStore, MemoryStoreOptions, NewOrder, ReadMode, StoreError, StoreTransaction,
};
use serial_test::serial;
use std::time::Duration;

fn new_order(label: &str, product: &str, quantity: i64) -> NewOrder {
  NewOrder {
    order_label: label.to_string(),
    product_name: product.to_string(),
    quantity,
  }
}

#[test]
fn test_create_product_rejects_duplicate_names() {
  let store = MemoryStore::new();
  let a = store.create_product("a", 200).unwrap();
  assert_eq!(a.quantity, 200);
  assert_eq!(a.name, "a");

  let err = store.create_product("a", 1).unwrap_err();
  assert!(matches!(err, StoreError::ConstraintViolation(_)));
  assert_eq!(store.products().len(), 1);
}

#[test]
fn test_non_negative_check_applies_to_seed_rows() {
  let store = MemoryStore::with_options(MemoryStoreOptions::default().with_non_negative_check(true));
  assert!(matches!(
    store.create_product("a", -1),
    Err(StoreError::ConstraintViolation(_))
  ));
  assert!(store.create_product("b", 0).is_ok());
}

#[tokio::test]
#[serial]
async fn test_uncommitted_writes_are_invisible_to_committed_state() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();

  assert_eq!(txn.decrement_quantity("a", 30).await.unwrap(), 170);
  let own = txn.find_product("a", ReadMode::Plain).await.unwrap().unwrap();
  assert_eq!(own.quantity, 170);
  txn.insert_order(new_order("Order 1", "a", 30)).await.unwrap();

  assert_eq!(store.product("a").unwrap().quantity, 200);
  assert!(store.orders().is_empty());

  txn.commit().await.unwrap();
  assert_eq!(store.product("a").unwrap().quantity, 170);
  assert_eq!(store.orders().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_closed_transaction_refuses_further_work() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  txn.commit().await.unwrap();

  let id = txn.id();
  assert!(matches!(
    txn.find_product("a", ReadMode::Plain).await,
    Err(StoreError::TransactionClosed(closed)) if closed == id
  ));
  assert!(matches!(txn.commit().await, Err(StoreError::TransactionClosed(_))));
  // Rolling back an ended transaction is a no-op.
  assert!(txn.rollback().await.is_ok());
}

#[tokio::test]
#[serial]
async fn test_dropping_an_open_transaction_rolls_it_back() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  {
    let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
    txn.decrement_quantity("a", 50).await.unwrap();
    assert_eq!(store.active_transactions(), 1);
  }
  assert_eq!(store.active_transactions(), 0);

  // The row lock was released with it.
  let next = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  assert_eq!(next.decrement_quantity("a", 1).await.unwrap(), 199);
  next.commit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_decrement_of_missing_row_is_row_missing() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  assert!(txn.find_product("z", ReadMode::ForUpdate).await.unwrap().is_none());
  assert!(matches!(
    txn.decrement_quantity("z", 1).await,
    Err(StoreError::RowMissing(_))
  ));
}

#[tokio::test]
#[serial]
async fn test_order_ids_are_not_reused_after_rollback() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);

  let rolled_back = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  let first = rolled_back.insert_order(new_order("Order 1", "a", 1)).await.unwrap();
  rolled_back.rollback().await.unwrap();

  let committed = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  let second = committed.insert_order(new_order("Order 2", "a", 1)).await.unwrap();
  committed.commit().await.unwrap();

  assert!(second.id > first.id);
  assert_eq!(store.orders().iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id]);
}

#[tokio::test]
#[serial]
async fn test_second_writer_waits_for_the_first_to_commit() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let first = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  first.decrement_quantity("a", 10).await.unwrap();

  let waiter = {
    let store = store.clone();
    tokio::spawn(async move {
      let second = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
      let left = second.decrement_quantity("a", 10).await.unwrap();
      second.commit().await.unwrap();
      left
    })
  };

  tokio::time::sleep(Duration::from_millis(30)).await;
  assert!(!waiter.is_finished());
  first.commit().await.unwrap();

  assert_eq!(waiter.await.unwrap(), 180);
  assert_eq!(store.product("a").unwrap().quantity, 180);
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_lock_wait_without_timeout_outlasts_a_long_hold() {
  setup_tracing();
  assert_eq!(MemoryStoreOptions::default().lock_timeout, None);
  let store = seeded_store(&[("a", 200)]);
  let holder = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  holder.decrement_quantity("a", 10).await.unwrap();

  let waiter = {
    let store = store.clone();
    tokio::spawn(async move {
      let second = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
      let left = second.decrement_quantity("a", 10).await?;
      second.commit().await?;
      Ok::<_, StoreError>(left)
    })
  };

  // Far longer than any finite default would allow.
  tokio::time::sleep(Duration::from_secs(10)).await;
  assert!(!waiter.is_finished());
  holder.commit().await.unwrap();

  assert_eq!(waiter.await.unwrap().unwrap(), 180);
  assert_eq!(store.product("a").unwrap().quantity, 180);
}

#[tokio::test]
#[serial]
async fn test_lock_wait_gives_up_after_timeout() {
  setup_tracing();
  let store = seeded_store_with(
    MemoryStoreOptions::default().with_lock_timeout(Duration::from_millis(20)),
    &[("a", 200)],
  );
  let holder = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  holder.find_product("a", ReadMode::ForUpdate).await.unwrap();

  let blocked = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  let err = blocked.decrement_quantity("a", 1).await.unwrap_err();
  assert!(matches!(err, StoreError::LockTimeout { .. }));
  assert!(err.is_transient());
  holder.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_serializable_commit_fails_when_read_was_overwritten() {
  setup_tracing();
  let store = seeded_store(&[("a", 200), ("b", 300)]);

  // Reads "a", writes only "b".
  let reader = store.begin(IsolationLevel::Serializable).await.unwrap();
  reader.find_product("a", ReadMode::Plain).await.unwrap();
  reader.decrement_quantity("b", 1).await.unwrap();

  let writer = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  writer.decrement_quantity("a", 5).await.unwrap();
  writer.commit().await.unwrap();

  let err = reader.commit().await.unwrap_err();
  assert!(matches!(err, StoreError::SerializationFailure(_)));
  assert_eq!(store.product("b").unwrap().quantity, 300);
  assert_eq!(store.active_transactions(), 0);
}

#[tokio::test]
#[serial]
async fn test_offline_store_fails_with_unavailable() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  store.set_available(false);

  assert!(matches!(
    txn.find_product("a", ReadMode::Plain).await,
    Err(StoreError::Unavailable(_))
  ));
  assert!(matches!(
    store.begin(IsolationLevel::ReadCommitted).await,
    Err(StoreError::Unavailable(_))
  ));
  store.set_available(true);
  txn.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_reset_clears_products_and_orders() {
  setup_tracing();
  let store = seeded_store(&[("a", 200)]);
  let txn = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
  txn.insert_order(new_order("Order 1", "a", 1)).await.unwrap();
  txn.commit().await.unwrap();

  store.reset();
  assert!(store.products().is_empty());
  assert!(store.orders().is_empty());
}
