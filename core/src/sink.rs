// stockguard/src/sink.rs

//! Where per-order reports go once an order is finished.

use crate::outcome::Outcome;
use crate::processor::OrderReport;
use parking_lot::Mutex;
use tracing::{error, info, warn};

pub trait OutcomeSink: Send + Sync {
  fn record(&self, report: &OrderReport);
}

/// Emits one structured `tracing` event per report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
  fn record(&self, report: &OrderReport) {
    let elapsed_ms = report.elapsed_ms;
    match &report.outcome {
      Outcome::Committed(order) => info!(
        order = %report.order_label,
        product = %report.product_name,
        quantity = report.quantity,
        order_id = order.id,
        attempts = report.attempts,
        elapsed_ms,
        "order committed"
      ),
      Outcome::Rejected(rejection) => info!(
        order = %report.order_label,
        product = %report.product_name,
        quantity = report.quantity,
        reason = %rejection,
        elapsed_ms,
        "order rejected"
      ),
      Outcome::Failed(failure) => {
        if failure.is_transient() {
          warn!(
            order = %report.order_label,
            product = %report.product_name,
            kind = %failure.kind,
            error = %failure.message,
            attempts = report.attempts,
            elapsed_ms,
            "order failed on a store conflict"
          )
        } else {
          error!(
            order = %report.order_label,
            product = %report.product_name,
            kind = %failure.kind,
            error = %failure.message,
            attempts = report.attempts,
            elapsed_ms,
            "order failed"
          )
        }
      }
    }
  }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  reports: Mutex<Vec<OrderReport>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reports(&self) -> Vec<OrderReport> {
    self.reports.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.reports.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.reports.lock().is_empty()
  }
}

impl OutcomeSink for MemorySink {
  fn record(&self, report: &OrderReport) {
    self.reports.lock().push(report.clone());
  }
}

/// Sends each report to every inner sink, in order.
pub struct FanoutSink(pub Vec<std::sync::Arc<dyn OutcomeSink>>);

// Inner sinks are trait objects, so Debug is written by hand.
impl std::fmt::Debug for FanoutSink {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FanoutSink").field("sinks", &self.0.len()).finish()
  }
}

impl OutcomeSink for FanoutSink {
  fn record(&self, report: &OrderReport) {
    for sink in &self.0 {
      sink.record(report);
    }
  }
}
