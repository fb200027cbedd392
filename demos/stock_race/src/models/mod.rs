// demos/stock_race/src/models/mod.rs

//! Row types for the `product` and `"order"` tables.

pub mod order;
pub mod product;

pub use order::OrderRow;
pub use product::ProductRow;
