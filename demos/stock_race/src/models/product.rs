// demos/stock_race/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use stockguard::Product;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductRow {
  pub id: i32,
  pub product: String,
  pub quantity: i32,
  #[sqlx(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
  #[sqlx(rename = "updatedAt")]
  pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
  fn from(row: ProductRow) -> Self {
    Product {
      id: i64::from(row.id),
      name: row.product,
      quantity: i64::from(row.quantity),
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}
