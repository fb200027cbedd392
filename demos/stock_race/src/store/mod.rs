// demos/stock_race/src/store/mod.rs

//! Chooses and prepares the store the batch runs against.

pub mod postgres;

use crate::config::{AppConfig, StoreBackend};
use crate::errors::{AppError, Result};
use crate::schema;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use stockguard::{InventoryStore, MemoryStore, MemoryStoreOptions, Product};
use tracing::info;

pub use postgres::PgInventoryStore;

/// Committed ledger rows for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerTotal {
  pub product: String,
  pub orders: i64,
  pub quantity: i64,
}

pub enum Backend {
  Memory(MemoryStore),
  Postgres {
    pool: PgPool,
    schema: String,
    store: PgInventoryStore,
  },
}

impl Backend {
  pub async fn connect(config: &AppConfig) -> Result<Self> {
    match config.backend {
      StoreBackend::Memory => {
        let mut options = MemoryStoreOptions::default().with_non_negative_check(config.enforce_non_negative);
        if let Some(timeout) = config.lock_timeout {
          options = options.with_lock_timeout(timeout);
        }
        Ok(Backend::Memory(MemoryStore::with_options(options)))
      }
      StoreBackend::Postgres => {
        let url = config
          .database_url
          .as_deref()
          .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;
        let pool = PgPoolOptions::new()
          .max_connections(config.pool.max_connections)
          .min_connections(0)
          .acquire_timeout(config.pool.acquire_timeout)
          .idle_timeout(config.pool.idle_timeout)
          .connect(url)
          .await?;
        info!(max_connections = config.pool.max_connections, "connected to postgres");
        let store = PgInventoryStore::new(pool.clone(), &config.schema, config.lock_timeout);
        Ok(Backend::Postgres {
          pool,
          schema: config.schema.clone(),
          store,
        })
      }
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Backend::Memory(_) => "memory",
      Backend::Postgres { .. } => "postgres",
    }
  }

  pub fn inventory_store(&self) -> Arc<dyn InventoryStore> {
    match self {
      Backend::Memory(store) => Arc::new(store.clone()),
      Backend::Postgres { store, .. } => Arc::new(store.clone()),
    }
  }

  /// Recreates the tables (or empties the memory store) and seeds products.
  pub async fn provision(&self, seed: &[(String, i64)], enforce_non_negative: bool) -> Result<()> {
    match self {
      Backend::Memory(store) => {
        store.reset();
        for (name, quantity) in seed {
          store.create_product(name, *quantity)?;
        }
      }
      Backend::Postgres { pool, schema, .. } => {
        schema::provision(pool, schema, enforce_non_negative).await?;
        schema::seed_products(pool, schema, seed).await?;
      }
    }
    info!(products = seed.len(), backend = self.name(), "store provisioned");
    Ok(())
  }

  pub async fn inventory(&self) -> Result<Vec<Product>> {
    match self {
      Backend::Memory(store) => Ok(store.products()),
      Backend::Postgres { pool, schema, .. } => schema::fetch_inventory(pool, schema).await,
    }
  }

  pub async fn ledger(&self) -> Result<Vec<LedgerTotal>> {
    match self {
      Backend::Memory(store) => {
        let mut totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for order in store.orders() {
          let entry = totals.entry(order.product_name).or_default();
          entry.0 += 1;
          entry.1 += order.quantity;
        }
        Ok(totals
          .into_iter()
          .map(|(product, (orders, quantity))| LedgerTotal {
            product,
            orders,
            quantity,
          })
          .collect())
      }
      Backend::Postgres { pool, schema, .. } => schema::ledger_totals(pool, schema).await,
    }
  }
}
