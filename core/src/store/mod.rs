// stockguard/src/store/mod.rs

//! The transactional store interface the coordinator runs against, and an
//! in-memory engine implementing it.

pub mod memory;

use crate::error::StoreResult;
use crate::isolation::{IsolationLevel, ReadMode};
use crate::model::{NewOrder, Order, Product};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::{MemoryStore, MemoryStoreOptions};

/// A store that can open transactions on the inventory table and order ledger.
///
/// Implementations are shared across every concurrent order, so they must be
/// cheap to call from many tasks at once.
#[async_trait]
pub trait InventoryStore: Send + Sync {
  /// Opens a transaction at `isolation`. Nothing is visible to other
  /// transactions until the returned handle commits.
  async fn begin(&self, isolation: IsolationLevel) -> StoreResult<Arc<dyn StoreTransaction>>;

  /// Short name used in logs.
  fn backend_name(&self) -> &'static str;
}

/// An open transaction.
///
/// Methods take `&self` so the handle can be shared with every step of the
/// coordinator's plan. After `commit` or `rollback` every call fails with
/// `StoreError::TransactionClosed`, except `rollback`, which is then a no-op.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
  fn id(&self) -> u64;

  fn isolation(&self) -> IsolationLevel;

  /// Looks up a product by name. `ReadMode::ForUpdate` takes the row lock first.
  async fn find_product(&self, name: &str, mode: ReadMode) -> StoreResult<Option<Product>>;

  /// `quantity = quantity - by` on the named row; returns the new quantity as
  /// seen by this transaction.
  async fn decrement_quantity(&self, name: &str, by: i64) -> StoreResult<i64>;

  async fn insert_order(&self, order: NewOrder) -> StoreResult<Order>;

  async fn commit(&self) -> StoreResult<()>;

  async fn rollback(&self) -> StoreResult<()>;
}
