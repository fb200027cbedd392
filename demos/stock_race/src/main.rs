// demos/stock_race/src/main.rs

//! Provisions the inventory, fires a batch of concurrent orders at it under the
//! configured isolation level, and reports what each order saw and what the
//! table looks like afterwards.

mod config;
mod errors;
mod generator;
mod models;
mod schema;
mod store;

use crate::config::{AppConfig, LogFormat};
use crate::store::Backend;
use serde_json::json;
use std::sync::Arc;
use stockguard::{
  BatchDispatcher, CoordinatorSettings, FanoutSink, MemorySink, OrderProcessor, OutcomeSink, RetryPolicy,
  TracingSink, TransactionCoordinator,
};
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter);
  match format {
    LogFormat::Pretty => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env()?;
  init_tracing(app_config.log_format);

  let run_id = Uuid::new_v4();
  run(app_config)
    .instrument(info_span!("stock_race", %run_id))
    .await
}

async fn run(app_config: AppConfig) -> anyhow::Result<()> {
  info!(
    backend = ?app_config.backend,
    isolation = %app_config.isolation,
    read_mode = ?app_config.read_mode,
    orders = app_config.order_count,
    hold_ms = app_config.hold.as_millis() as u64,
    "configuration loaded"
  );

  let backend = Backend::connect(&app_config).await?;
  backend
    .provision(&app_config.seed_products, app_config.enforce_non_negative)
    .await?;

  let coordinator = TransactionCoordinator::new(
    backend.inventory_store(),
    CoordinatorSettings::default()
      .isolation(app_config.isolation)
      .read_mode(app_config.read_mode)
      .hold(app_config.hold),
  );
  let retry = RetryPolicy::builder()
    .max_retries(app_config.retry_max)
    .initial_delay(app_config.retry_initial_delay)
    .build();
  let collected = Arc::new(MemorySink::new());
  let sinks: Vec<Arc<dyn OutcomeSink>> = vec![Arc::new(TracingSink), collected.clone()];
  let processor = OrderProcessor::new(Arc::new(coordinator))
    .with_retry(retry)
    .with_sink(Arc::new(FanoutSink(sinks)));
  let dispatcher = BatchDispatcher::new(Arc::new(processor)).with_max_in_flight(app_config.max_in_flight);

  let requests = generator::generate_orders(app_config.order_count, &mut rand::thread_rng());
  let batch = dispatcher.dispatch(requests).await;

  let inventory = backend.inventory().await?;
  let ledger = backend.ledger().await?;
  for product in &inventory {
    if product.quantity < 0 {
      warn!(product = %product.name, quantity = product.quantity, "product oversold");
    } else {
      info!(product = %product.name, quantity = product.quantity, "final stock");
    }
  }
  for total in &ledger {
    info!(product = %total.product, orders = total.orders, quantity = total.quantity, "ledger");
  }

  let report = json!({
    "backend": backend.name(),
    "isolation": app_config.isolation,
    "read_mode": app_config.read_mode,
    "summary": batch.summary,
    "inventory": inventory,
    "ledger": ledger,
    "reports_recorded": collected.len(),
  });
  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}
