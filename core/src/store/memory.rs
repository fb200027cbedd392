// stockguard/src/store/memory.rs

//! An in-memory transactional engine for the inventory table and order ledger.
//!
//! Writes take an exclusive row lock held until commit or rollback; waiting
//! writers give up after `lock_timeout` if one is set, and otherwise wait for
//! the holder to end. Visibility follows the isolation level:
//!
//! - `ReadUncommitted` sees the uncommitted quantity of the row's lock holder.
//! - `ReadCommitted` sees the latest committed version.
//! - `RepeatableRead` reads the snapshot taken at `begin`. Writing (or locking)
//!   a row that another transaction committed after the snapshot is a
//!   serialization failure.
//! - `Serializable` additionally re-validates its read set at commit; the first
//!   committer wins.
//!
//! Order ids come from a sequence that is never rolled back, so ids of rolled
//! back inserts leave gaps.

use crate::error::{StoreError, StoreResult};
use crate::isolation::{IsolationLevel, ReadMode};
use crate::model::{NewOrder, Order, Product};
use crate::store::{InventoryStore, StoreTransaction};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
pub struct MemoryStoreOptions {
  /// How long a writer waits for another transaction's row lock. `None`
  /// waits until the holder ends, like a database without `lock_timeout`.
  pub lock_timeout: Option<Duration>,
  /// Reject decrements that would leave a row below zero, like a
  /// `CHECK (quantity >= 0)` constraint.
  pub enforce_non_negative: bool,
}

impl Default for MemoryStoreOptions {
  fn default() -> Self {
    Self {
      lock_timeout: None,
      enforce_non_negative: false,
    }
  }
}

impl MemoryStoreOptions {
  pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
    self.lock_timeout = Some(lock_timeout);
    self
  }

  pub fn with_non_negative_check(mut self, enforce: bool) -> Self {
    self.enforce_non_negative = enforce;
    self
  }
}

/// Cloneable handle to a shared in-memory engine.
#[derive(Clone)]
pub struct MemoryStore {
  engine: Arc<Engine>,
}

struct Engine {
  state: Mutex<EngineState>,
  /// Woken whenever a transaction ends and its row locks are released.
  released: Notify,
  next_txn_id: AtomicU64,
  available: AtomicBool,
  options: MemoryStoreOptions,
}

#[derive(Default)]
struct EngineState {
  commit_seq: u64,
  next_product_id: i64,
  next_order_id: i64,
  products: BTreeMap<String, ProductRow>,
  orders: Vec<Order>,
  /// Snapshot sequence of every open transaction, keyed by transaction id.
  active: HashMap<u64, u64>,
}

struct RowVersion {
  seq: u64,
  product: Product,
}

struct ProductRow {
  current: RowVersion,
  /// Older committed versions, oldest first, kept while a snapshot may need them.
  history: Vec<RowVersion>,
  lock_holder: Option<u64>,
  /// Uncommitted quantity written by `lock_holder`.
  pending: Option<i64>,
}

impl ProductRow {
  fn visible_at(&self, snapshot: u64) -> Option<&RowVersion> {
    if self.current.seq <= snapshot {
      return Some(&self.current);
    }
    self.history.iter().rev().find(|v| v.seq <= snapshot)
  }

  fn prune(&mut self, min_snapshot: u64) {
    if self.current.seq <= min_snapshot {
      self.history.clear();
    } else if let Some(keep_from) = self.history.iter().rposition(|v| v.seq <= min_snapshot) {
      self.history.drain(..keep_from);
    }
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::with_options(MemoryStoreOptions::default())
  }

  pub fn with_options(options: MemoryStoreOptions) -> Self {
    Self {
      engine: Arc::new(Engine {
        state: Mutex::new(EngineState::default()),
        released: Notify::new(),
        next_txn_id: AtomicU64::new(0),
        available: AtomicBool::new(true),
        options,
      }),
    }
  }

  pub fn options(&self) -> &MemoryStoreOptions {
    &self.engine.options
  }

  /// Inserts a committed product row outside of any transaction.
  pub fn create_product(&self, name: &str, quantity: i64) -> StoreResult<Product> {
    let mut guard = self.engine.state.lock();
    let state: &mut EngineState = &mut guard;
    if state.products.contains_key(name) {
      return Err(StoreError::ConstraintViolation(format!(
        "product_name_key: product '{}' already exists",
        name
      )));
    }
    if self.engine.options.enforce_non_negative && quantity < 0 {
      return Err(StoreError::ConstraintViolation(format!(
        "product_quantity_check: '{}' cannot start at {}",
        name, quantity
      )));
    }
    state.commit_seq += 1;
    state.next_product_id += 1;
    let now = Utc::now();
    let product = Product {
      id: state.next_product_id,
      name: name.to_string(),
      quantity,
      created_at: now,
      updated_at: now,
    };
    state.products.insert(
      name.to_string(),
      ProductRow {
        current: RowVersion {
          seq: state.commit_seq,
          product: product.clone(),
        },
        history: Vec::new(),
        lock_holder: None,
        pending: None,
      },
    );
    debug!(product = name, quantity, "product created");
    Ok(product)
  }

  /// Latest committed version of a product.
  pub fn product(&self, name: &str) -> Option<Product> {
    self.engine.state.lock().products.get(name).map(|row| row.current.product.clone())
  }

  pub fn products(&self) -> Vec<Product> {
    self
      .engine
      .state
      .lock()
      .products
      .values()
      .map(|row| row.current.product.clone())
      .collect()
  }

  /// Committed ledger, in commit order.
  pub fn orders(&self) -> Vec<Order> {
    self.engine.state.lock().orders.clone()
  }

  pub fn orders_for(&self, product_name: &str) -> Vec<Order> {
    self
      .engine
      .state
      .lock()
      .orders
      .iter()
      .filter(|o| o.product_name == product_name)
      .cloned()
      .collect()
  }

  pub fn active_transactions(&self) -> usize {
    self.engine.state.lock().active.len()
  }

  /// Simulates losing (or regaining) the connection to the store. While
  /// unavailable, `begin` and every statement fail with `StoreError::Unavailable`.
  pub fn set_available(&self, available: bool) {
    self.engine.available.store(available, Ordering::SeqCst);
  }

  /// Drops every product and order. Only call while no transaction is open.
  pub fn reset(&self) {
    let mut state = self.engine.state.lock();
    if !state.active.is_empty() {
      warn!(open = state.active.len(), "resetting memory store with open transactions");
    }
    state.products.clear();
    state.orders.clear();
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl InventoryStore for MemoryStore {
  async fn begin(&self, isolation: IsolationLevel) -> StoreResult<Arc<dyn StoreTransaction>> {
    if !self.engine.available.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("memory store is offline".to_string()));
    }
    let id = self.engine.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1;
    let snapshot = {
      let mut state = self.engine.state.lock();
      let snapshot = state.commit_seq;
      state.active.insert(id, snapshot);
      snapshot
    };
    debug!(txn = id, %isolation, snapshot, "transaction started");
    Ok(Arc::new(MemoryTransaction {
      id,
      isolation,
      snapshot,
      engine: Arc::clone(&self.engine),
      local: Mutex::new(TxnLocal::default()),
    }))
  }

  fn backend_name(&self) -> &'static str {
    "memory"
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TxnStatus {
  #[default]
  Active,
  Committed,
  RolledBack,
}

#[derive(Default)]
struct TxnLocal {
  status: TxnStatus,
  /// Serializable only: committed version seq observed per row.
  read_set: HashMap<String, u64>,
  writes: BTreeMap<String, i64>,
  orders: Vec<Order>,
  locks: HashSet<String>,
}

/// Lock order is always engine state first, then the transaction's own state.
pub struct MemoryTransaction {
  id: u64,
  isolation: IsolationLevel,
  snapshot: u64,
  engine: Arc<Engine>,
  local: Mutex<TxnLocal>,
}

impl MemoryTransaction {
  fn ensure_usable(&self) -> StoreResult<()> {
    if !self.engine.available.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("memory store is offline".to_string()));
    }
    if self.local.lock().status != TxnStatus::Active {
      return Err(StoreError::TransactionClosed(self.id));
    }
    Ok(())
  }

  async fn acquire_row_lock(&self, name: &str) -> StoreResult<()> {
    let timeout = self.engine.options.lock_timeout;
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
      // Register for the release notification before checking, so a release
      // between the check and the await is not missed.
      let released = self.engine.released.notified();
      {
        let mut state = self.engine.state.lock();
        let mut local = self.local.lock();
        if local.status != TxnStatus::Active {
          return Err(StoreError::TransactionClosed(self.id));
        }
        let row = state
          .products
          .get_mut(name)
          .ok_or_else(|| StoreError::RowMissing(name.to_string()))?;
        match row.lock_holder {
          None => {
            row.lock_holder = Some(self.id);
            local.locks.insert(name.to_string());
            return Ok(());
          }
          Some(holder) if holder == self.id => return Ok(()),
          Some(holder) => trace!(txn = self.id, holder, row = name, "waiting for row lock"),
        }
      }
      let Some((deadline, waited)) = deadline.zip(timeout) else {
        released.await;
        continue;
      };
      if tokio::time::timeout_at(deadline, released).await.is_err() {
        debug!(txn = self.id, row = name, ?waited, "row lock wait timed out");
        return Err(StoreError::LockTimeout {
          resource: format!("product:{}", name),
          waited,
        });
      }
    }
  }

  /// Rolls back if still active. Returns whether anything was rolled back.
  fn abort(&self) -> bool {
    {
      let mut guard = self.engine.state.lock();
      let mut local = self.local.lock();
      if local.status != TxnStatus::Active {
        return false;
      }
      end_transaction(&mut guard, &mut local, self.id, TxnStatus::RolledBack);
    }
    self.engine.released.notify_waiters();
    debug!(txn = self.id, "transaction rolled back");
    true
  }
}

fn end_transaction(state: &mut EngineState, local: &mut TxnLocal, txn_id: u64, status: TxnStatus) {
  for name in local.locks.drain() {
    if let Some(row) = state.products.get_mut(&name) {
      if row.lock_holder == Some(txn_id) {
        row.lock_holder = None;
        row.pending = None;
      }
    }
  }
  local.writes.clear();
  local.orders.clear();
  local.read_set.clear();
  local.status = status;
  state.active.remove(&txn_id);
}

fn product_with_quantity(product: &Product, quantity: i64) -> Product {
  Product {
    quantity,
    ..product.clone()
  }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
  fn id(&self) -> u64 {
    self.id
  }

  fn isolation(&self) -> IsolationLevel {
    self.isolation
  }

  async fn find_product(&self, name: &str, mode: ReadMode) -> StoreResult<Option<Product>> {
    self.ensure_usable()?;
    if mode == ReadMode::ForUpdate {
      match self.acquire_row_lock(name).await {
        Ok(()) => {}
        Err(StoreError::RowMissing(_)) => return Ok(None),
        Err(e) => return Err(e),
      }
    }

    let state = self.engine.state.lock();
    let mut local = self.local.lock();
    let Some(row) = state.products.get(name) else {
      return Ok(None);
    };
    if let Some(&own) = local.writes.get(name) {
      return Ok(Some(product_with_quantity(&row.current.product, own)));
    }

    let (seq, product) = if self.isolation.uses_snapshot() {
      if mode == ReadMode::ForUpdate && row.current.seq > self.snapshot {
        return Err(StoreError::SerializationFailure(format!(
          "row '{}' was updated by a concurrent transaction",
          name
        )));
      }
      match row.visible_at(self.snapshot) {
        Some(version) => (version.seq, version.product.clone()),
        None => return Ok(None),
      }
    } else if let (true, Some(dirty)) = (self.isolation.allows_dirty_reads(), row.pending) {
      (row.current.seq, product_with_quantity(&row.current.product, dirty))
    } else {
      (row.current.seq, row.current.product.clone())
    };

    if self.isolation == IsolationLevel::Serializable {
      local.read_set.insert(name.to_string(), seq);
    }
    trace!(txn = self.id, product = name, quantity = product.quantity, "product read");
    Ok(Some(product))
  }

  async fn decrement_quantity(&self, name: &str, by: i64) -> StoreResult<i64> {
    self.ensure_usable()?;
    self.acquire_row_lock(name).await?;

    let mut state = self.engine.state.lock();
    let mut local = self.local.lock();
    let row = state
      .products
      .get_mut(name)
      .ok_or_else(|| StoreError::RowMissing(name.to_string()))?;
    if self.isolation.uses_snapshot() && row.current.seq > self.snapshot {
      return Err(StoreError::SerializationFailure(format!(
        "row '{}' was updated by a concurrent transaction",
        name
      )));
    }
    let base = local.writes.get(name).copied().unwrap_or(row.current.product.quantity);
    let new_quantity = base - by;
    if self.engine.options.enforce_non_negative && new_quantity < 0 {
      return Err(StoreError::ConstraintViolation(format!(
        "product_quantity_check: '{}' would drop to {}",
        name, new_quantity
      )));
    }
    local.writes.insert(name.to_string(), new_quantity);
    row.pending = Some(new_quantity);
    trace!(txn = self.id, product = name, from = base, to = new_quantity, "quantity decremented");
    Ok(new_quantity)
  }

  async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
    self.ensure_usable()?;
    let mut state = self.engine.state.lock();
    let mut local = self.local.lock();
    if local.status != TxnStatus::Active {
      return Err(StoreError::TransactionClosed(self.id));
    }
    state.next_order_id += 1;
    let now = Utc::now();
    let order = Order {
      id: state.next_order_id,
      order_label: order.order_label,
      product_name: order.product_name,
      quantity: order.quantity,
      created_at: now,
      updated_at: now,
    };
    local.orders.push(order.clone());
    Ok(order)
  }

  async fn commit(&self) -> StoreResult<()> {
    self.ensure_usable()?;
    let result = {
      let mut guard = self.engine.state.lock();
      let state: &mut EngineState = &mut guard;
      let mut local = self.local.lock();
      if local.status != TxnStatus::Active {
        return Err(StoreError::TransactionClosed(self.id));
      }

      let invalidated = if self.isolation == IsolationLevel::Serializable {
        local
          .read_set
          .iter()
          .find(|(name, seen)| {
            !local.writes.contains_key(name.as_str())
              && state.products.get(name.as_str()).map_or(true, |row| row.current.seq != **seen)
          })
          .map(|(name, _)| name.clone())
      } else {
        None
      };

      if let Some(name) = invalidated {
        end_transaction(state, &mut local, self.id, TxnStatus::RolledBack);
        Err(StoreError::SerializationFailure(format!(
          "read of '{}' was invalidated by a concurrent commit",
          name
        )))
      } else {
        let writes = std::mem::take(&mut local.writes);
        if !writes.is_empty() {
          state.commit_seq += 1;
        }
        let seq = state.commit_seq;
        let now = Utc::now();
        for (name, quantity) in &writes {
          if let Some(row) = state.products.get_mut(name) {
            let product = Product {
              quantity: *quantity,
              updated_at: now,
              ..row.current.product.clone()
            };
            let previous = std::mem::replace(&mut row.current, RowVersion { seq, product });
            row.history.push(previous);
          }
        }
        state.orders.append(&mut local.orders);
        end_transaction(state, &mut local, self.id, TxnStatus::Committed);

        let min_snapshot = state.active.values().min().copied().unwrap_or(state.commit_seq);
        for name in writes.keys() {
          if let Some(row) = state.products.get_mut(name) {
            row.prune(min_snapshot);
          }
        }
        Ok(())
      }
    };
    self.engine.released.notify_waiters();
    match &result {
      Ok(()) => debug!(txn = self.id, "transaction committed"),
      Err(e) => debug!(txn = self.id, error = %e, "commit validation failed, rolled back"),
    }
    result
  }

  async fn rollback(&self) -> StoreResult<()> {
    self.abort();
    Ok(())
  }
}

impl Drop for MemoryTransaction {
  fn drop(&mut self) {
    if self.abort() {
      warn!(txn = self.id, "transaction dropped while active; rolled back");
    }
  }
}
