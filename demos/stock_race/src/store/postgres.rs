// demos/stock_race/src/store/postgres.rs

//! `InventoryStore` over a PostgreSQL pool.

use crate::models::{OrderRow, ProductRow};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stockguard::{
  InventoryStore, IsolationLevel, NewOrder, Order, Product, ReadMode, StoreError, StoreResult, StoreTransaction,
};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct PgInventoryStore {
  pool: PgPool,
  schema: Arc<str>,
  lock_timeout: Option<Duration>,
  next_txn_id: Arc<AtomicU64>,
}

impl PgInventoryStore {
  /// `schema` must already be a validated plain identifier.
  pub fn new(pool: PgPool, schema: &str, lock_timeout: Option<Duration>) -> Self {
    Self {
      pool,
      schema: Arc::from(schema),
      lock_timeout,
      next_txn_id: Arc::new(AtomicU64::new(0)),
    }
  }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
  #[instrument(name = "PgInventoryStore::begin", skip_all, fields(isolation = %isolation))]
  async fn begin(&self, isolation: IsolationLevel) -> StoreResult<Arc<dyn StoreTransaction>> {
    let mut tx = self.pool.begin().await.map_err(|e| classify(e, self.lock_timeout))?;

    sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()))
      .execute(&mut *tx)
      .await
      .map_err(|e| classify(e, self.lock_timeout))?;
    if let Some(timeout) = self.lock_timeout {
      sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis()))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, self.lock_timeout))?;
    }

    let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(txn = id, "transaction started");
    Ok(Arc::new(PgTransaction {
      id,
      isolation,
      schema: Arc::clone(&self.schema),
      lock_timeout: self.lock_timeout,
      tx: Mutex::new(Some(tx)),
    }))
  }

  fn backend_name(&self) -> &'static str {
    "postgres"
  }
}

/// Open transaction. Dropping it while still open rolls it back (sqlx does
/// this when the inner `Transaction` is dropped).
pub struct PgTransaction {
  id: u64,
  isolation: IsolationLevel,
  schema: Arc<str>,
  lock_timeout: Option<Duration>,
  tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgTransaction {
  fn classify(&self, err: sqlx::Error) -> StoreError {
    classify(err, self.lock_timeout)
  }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
  fn id(&self) -> u64 {
    self.id
  }

  fn isolation(&self) -> IsolationLevel {
    self.isolation
  }

  async fn find_product(&self, name: &str, mode: ReadMode) -> StoreResult<Option<Product>> {
    let lock_clause = match mode {
      ReadMode::Plain => "",
      ReadMode::ForUpdate => " FOR UPDATE",
    };
    let sql = format!(
      r#"SELECT id, product, quantity, "createdAt", "updatedAt" FROM "{}".product WHERE product = $1 LIMIT 1{}"#,
      self.schema, lock_clause
    );

    let mut guard = self.tx.lock().await;
    let tx = guard.as_mut().ok_or(StoreError::TransactionClosed(self.id))?;
    let row: Option<ProductRow> = sqlx::query_as(&sql)
      .bind(name)
      .fetch_optional(&mut **tx)
      .await
      .map_err(|e| self.classify(e))?;
    Ok(row.map(Product::from))
  }

  async fn decrement_quantity(&self, name: &str, by: i64) -> StoreResult<i64> {
    let by = i32::try_from(by)
      .map_err(|_| StoreError::ConstraintViolation(format!("quantity {} out of range for column", by)))?;
    let sql = format!(
      r#"UPDATE "{}".product SET quantity = quantity - $1, "updatedAt" = NOW() WHERE product = $2 RETURNING quantity"#,
      self.schema
    );

    let mut guard = self.tx.lock().await;
    let tx = guard.as_mut().ok_or(StoreError::TransactionClosed(self.id))?;
    let remaining: Option<i32> = sqlx::query_scalar(&sql)
      .bind(by)
      .bind(name)
      .fetch_optional(&mut **tx)
      .await
      .map_err(|e| self.classify(e))?;
    remaining
      .map(i64::from)
      .ok_or_else(|| StoreError::RowMissing(name.to_string()))
  }

  async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
    let quantity = i32::try_from(order.quantity)
      .map_err(|_| StoreError::ConstraintViolation(format!("quantity {} out of range for column", order.quantity)))?;
    let sql = format!(
      r#"INSERT INTO "{}"."order" ("order", product, quantity, "createdAt", "updatedAt")
         VALUES ($1, $2, $3, NOW(), NOW())
         RETURNING id, product, "order", quantity, "createdAt", "updatedAt""#,
      self.schema
    );

    let mut guard = self.tx.lock().await;
    let tx = guard.as_mut().ok_or(StoreError::TransactionClosed(self.id))?;
    let row: OrderRow = sqlx::query_as(&sql)
      .bind(&order.order_label)
      .bind(&order.product_name)
      .bind(quantity)
      .fetch_one(&mut **tx)
      .await
      .map_err(|e| self.classify(e))?;
    Ok(Order::from(row))
  }

  async fn commit(&self) -> StoreResult<()> {
    let tx = self.tx.lock().await.take().ok_or(StoreError::TransactionClosed(self.id))?;
    tx.commit().await.map_err(|e| self.classify(e))
  }

  async fn rollback(&self) -> StoreResult<()> {
    match self.tx.lock().await.take() {
      Some(tx) => tx.rollback().await.map_err(|e| self.classify(e)),
      None => Ok(()),
    }
  }
}

/// Maps a driver error onto the store taxonomy.
pub fn classify(err: sqlx::Error, lock_timeout: Option<Duration>) -> StoreError {
  let classified = match &err {
    sqlx::Error::Database(db_err) => {
      let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
      classify_sqlstate(&code, db_err.message(), lock_timeout)
    }
    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
      Some(StoreError::Unavailable(err.to_string()))
    }
    _ => None,
  };
  classified.unwrap_or_else(|| StoreError::Backend { source: err.into() })
}

/// SQLSTATE classes the coordinator cares about; `None` for anything else.
pub fn classify_sqlstate(code: &str, message: &str, lock_timeout: Option<Duration>) -> Option<StoreError> {
  match code {
    "40001" => Some(StoreError::SerializationFailure(message.to_string())),
    "40P01" => Some(StoreError::Deadlock(message.to_string())),
    "55P03" => Some(StoreError::LockTimeout {
      resource: message.to_string(),
      waited: lock_timeout.unwrap_or_default(),
    }),
    // 57P01 admin_shutdown and friends: the server went away under us.
    c if c.starts_with("08") || c.starts_with("57P") => Some(StoreError::Unavailable(message.to_string())),
    c if c.starts_with("23") => Some(StoreError::ConstraintViolation(message.to_string())),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conflicts_are_transient() {
    for code in ["40001", "40P01", "55P03"] {
      let err = classify_sqlstate(code, "conflict", Some(Duration::from_millis(100))).unwrap();
      assert!(err.is_transient(), "{}", code);
    }
  }

  #[test]
  fn check_violation_is_a_constraint_failure() {
    let err = classify_sqlstate("23514", "violates check constraint \"product_quantity_check\"", None).unwrap();
    assert!(matches!(err, StoreError::ConstraintViolation(_)));
    assert!(!err.is_transient());
  }

  #[test]
  fn connection_classes_are_unavailable() {
    assert!(matches!(
      classify_sqlstate("08006", "connection failure", None),
      Some(StoreError::Unavailable(_))
    ));
    assert!(matches!(
      classify_sqlstate("57P01", "terminating connection", None),
      Some(StoreError::Unavailable(_))
    ));
  }

  #[test]
  fn unknown_codes_are_left_to_the_caller() {
    assert!(classify_sqlstate("42P01", "relation does not exist", None).is_none());
  }

  #[test]
  fn pool_timeout_is_unavailable() {
    assert!(matches!(
      classify(sqlx::Error::PoolTimedOut, None),
      StoreError::Unavailable(_)
    ));
    assert!(matches!(
      classify(sqlx::Error::RowNotFound, None),
      StoreError::Backend { .. }
    ));
  }
}
