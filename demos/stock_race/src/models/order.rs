// demos/stock_race/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use stockguard::Order;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderRow {
  pub id: i32,
  pub product: String,
  #[sqlx(rename = "order")]
  pub order_label: String,
  pub quantity: i32,
  #[sqlx(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
  #[sqlx(rename = "updatedAt")]
  pub updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: i64::from(row.id),
      order_label: row.order_label,
      product_name: row.product,
      quantity: i64::from(row.quantity),
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}
