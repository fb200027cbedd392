// stockguard/src/model.rs

//! Records read from and written to the inventory store, and the ephemeral
//! request that drives one order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the inventory table. `name` is the unique business key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub id: i64,
  pub name: String,
  pub quantity: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A row of the order ledger. Only exists once its decrement has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: i64,
  pub order_label: String,
  pub product_name: String,
  pub quantity: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Ledger insert payload; the store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
  pub order_label: String,
  pub product_name: String,
  pub quantity: i64,
}

/// One incoming order. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
  pub order_label: String,
  pub product_name: String,
  pub quantity: i64,
  /// Hold the transaction open for the coordinator's hold duration.
  #[serde(default)]
  pub simulate_delay: bool,
}

impl OrderRequest {
  pub fn new(order_label: impl Into<String>, product_name: impl Into<String>, quantity: i64) -> Self {
    Self {
      order_label: order_label.into(),
      product_name: product_name.into(),
      quantity,
      simulate_delay: false,
    }
  }

  pub fn with_simulated_delay(mut self, simulate_delay: bool) -> Self {
    self.simulate_delay = simulate_delay;
    self
  }

  pub(crate) fn to_new_order(&self) -> NewOrder {
    NewOrder {
      order_label: self.order_label.clone(),
      product_name: self.product_name.clone(),
      quantity: self.quantity,
    }
  }
}
