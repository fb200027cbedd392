// stockguard/src/processor.rs

//! Order processor: the boundary past which nothing is an error.
//!
//! Wraps the coordinator with the retry policy and reports every finished
//! order to an `OutcomeSink`.

use crate::coordinator::TransactionCoordinator;
use crate::model::OrderRequest;
use crate::outcome::Outcome;
use crate::retry::RetryPolicy;
use crate::sink::{OutcomeSink, TracingSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// What happened to one request, as handed to sinks and batch callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReport {
  pub order_label: String,
  pub product_name: String,
  pub quantity: i64,
  pub outcome: Outcome,
  /// Transactions opened for this request, including retries.
  pub attempts: usize,
  pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct OrderProcessor {
  coordinator: Arc<TransactionCoordinator>,
  retry: RetryPolicy,
  sink: Arc<dyn OutcomeSink>,
}

impl OrderProcessor {
  pub fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
    Self {
      coordinator,
      retry: RetryPolicy::none(),
      sink: Arc::new(TracingSink),
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
    &self.coordinator
  }

  pub fn retry_policy(&self) -> &RetryPolicy {
    &self.retry
  }

  pub fn sink(&self) -> &Arc<dyn OutcomeSink> {
    &self.sink
  }

  /// Processes one request to a final outcome. Transient store conflicts are
  /// retried under the processor's policy; everything else is final on the
  /// first attempt.
  #[instrument(
    name = "OrderProcessor::process",
    skip_all,
    fields(order = %request.order_label)
  )]
  pub async fn process(&self, request: OrderRequest) -> OrderReport {
    let started = Instant::now();
    let mut attempts = 0usize;

    let outcome = loop {
      attempts += 1;
      let outcome = self.coordinator.process_order(&request).await;

      let retry_after = match &outcome {
        Outcome::Failed(failure) if self.retry.should_retry(failure, attempts) => {
          Some(self.retry.delay_for_retry(attempts - 1))
        }
        _ => None,
      };

      match retry_after {
        Some(delay) => {
          debug!(attempt = attempts, ?delay, "store conflict, retrying order");
          tokio::time::sleep(delay).await;
        }
        None => break outcome,
      }
    };

    let report = OrderReport {
      order_label: request.order_label,
      product_name: request.product_name,
      quantity: request.quantity,
      outcome,
      attempts,
      elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    self.sink.record(&report);
    report
  }
}
