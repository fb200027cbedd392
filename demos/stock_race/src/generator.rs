// demos/stock_race/src/generator.rs

use rand::Rng;
use stockguard::OrderRequest;

/// Builds the reference batch: `Order i` goes to `a` for even `i` and `b`
/// otherwise, every fourth order holds its transaction open, and quantities
/// are random in `1..10`.
pub fn generate_orders(count: usize, rng: &mut impl Rng) -> Vec<OrderRequest> {
  (0..count)
    .map(|i| {
      let product = if i % 2 == 0 { "a" } else { "b" };
      OrderRequest::new(format!("Order {}", i), product, rng.gen_range(1..10)).with_simulated_delay(i % 4 == 0)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn batch_follows_the_reference_shape() {
    let orders = generate_orders(100, &mut StdRng::seed_from_u64(7));
    assert_eq!(orders.len(), 100);
    for (i, order) in orders.iter().enumerate() {
      assert_eq!(order.order_label, format!("Order {}", i));
      assert_eq!(order.product_name, if i % 2 == 0 { "a" } else { "b" });
      assert_eq!(order.simulate_delay, i % 4 == 0);
      assert!((1..10).contains(&order.quantity));
    }
  }

  #[test]
  fn same_seed_gives_same_batch() {
    let first = generate_orders(20, &mut StdRng::seed_from_u64(42));
    let second = generate_orders(20, &mut StdRng::seed_from_u64(42));
    assert_eq!(first, second);
  }
}
