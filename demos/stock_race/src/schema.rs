// demos/stock_race/src/schema.rs

//! Table provisioning and inspection for the postgres backend. The layout
//! mirrors the `product` / `"order"` tables of the reference workload,
//! including its camel-case timestamp columns.

use crate::errors::Result;
use crate::models::ProductRow;
use crate::store::LedgerTotal;
use sqlx::PgPool;
use stockguard::Product;
use tracing::{info, instrument};

/// Drops and recreates both tables inside `schema`.
#[instrument(skip(pool))]
pub async fn provision(pool: &PgPool, schema: &str, enforce_non_negative: bool) -> Result<()> {
  let check = if enforce_non_negative {
    " CONSTRAINT product_quantity_check CHECK (quantity >= 0)"
  } else {
    ""
  };
  let statements = [
    format!(r#"CREATE SCHEMA IF NOT EXISTS "{schema}""#),
    format!(r#"DROP TABLE IF EXISTS "{schema}"."order""#),
    format!(r#"DROP TABLE IF EXISTS "{schema}".product"#),
    format!(
      r#"CREATE TABLE "{schema}".product (
           id SERIAL PRIMARY KEY,
           product VARCHAR(255) UNIQUE,
           quantity INTEGER{check},
           "createdAt" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
           "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT NOW()
         )"#
    ),
    format!(
      r#"CREATE TABLE "{schema}"."order" (
           id SERIAL PRIMARY KEY,
           product VARCHAR(255),
           "order" VARCHAR(255),
           quantity INTEGER,
           "createdAt" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
           "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT NOW()
         )"#
    ),
  ];

  for statement in &statements {
    sqlx::query(statement).execute(pool).await?;
  }
  info!("tables recreated");
  Ok(())
}

pub async fn seed_products(pool: &PgPool, schema: &str, seed: &[(String, i64)]) -> Result<()> {
  let sql = format!(r#"INSERT INTO "{schema}".product (product, quantity) VALUES ($1, $2)"#);
  for (name, quantity) in seed {
    let quantity = i32::try_from(*quantity)
      .map_err(|_| crate::errors::AppError::Config(format!("seed quantity for '{}' does not fit INTEGER", name)))?;
    sqlx::query(&sql).bind(name).bind(quantity).execute(pool).await?;
  }
  Ok(())
}

pub async fn fetch_inventory(pool: &PgPool, schema: &str) -> Result<Vec<Product>> {
  let sql = format!(r#"SELECT id, product, quantity, "createdAt", "updatedAt" FROM "{schema}".product ORDER BY product"#);
  let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
  Ok(rows.into_iter().map(Product::from).collect())
}

pub async fn ledger_totals(pool: &PgPool, schema: &str) -> Result<Vec<LedgerTotal>> {
  let sql = format!(
    r#"SELECT product, COUNT(*) AS orders, COALESCE(SUM(quantity), 0)::BIGINT AS quantity
       FROM "{schema}"."order" GROUP BY product ORDER BY product"#
  );
  let rows: Vec<(String, i64, i64)> = sqlx::query_as(&sql).fetch_all(pool).await?;
  Ok(rows
    .into_iter()
    .map(|(product, orders, quantity)| LedgerTotal {
      product,
      orders,
      quantity,
    })
    .collect())
}
