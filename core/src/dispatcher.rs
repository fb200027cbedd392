// stockguard/src/dispatcher.rs

//! Batch dispatcher: runs many orders at once and waits for all of them.

use crate::model::OrderRequest;
use crate::outcome::{Failure, FailureKind, Outcome};
use crate::processor::{OrderProcessor, OrderReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
  pub total: usize,
  pub committed: usize,
  pub rejected: usize,
  pub failed: usize,
  /// Failures that were store conflicts (after any retries).
  pub conflicts: usize,
  /// Sum of committed order quantities, keyed by product.
  pub committed_quantity: BTreeMap<String, i64>,
  pub elapsed_ms: u64,
}

impl BatchSummary {
  fn tally(reports: &[OrderReport], elapsed_ms: u64) -> Self {
    let mut summary = BatchSummary {
      total: reports.len(),
      elapsed_ms,
      ..Default::default()
    };
    for report in reports {
      match &report.outcome {
        Outcome::Committed(order) => {
          summary.committed += 1;
          *summary.committed_quantity.entry(order.product_name.clone()).or_default() += order.quantity;
        }
        Outcome::Rejected(_) => summary.rejected += 1,
        Outcome::Failed(failure) => {
          summary.failed += 1;
          if failure.kind == FailureKind::Conflict {
            summary.conflicts += 1;
          }
        }
      }
    }
    summary
  }
}

/// Every report of a batch, in submission order, and their tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
  pub reports: Vec<OrderReport>,
  pub summary: BatchSummary,
}

impl BatchReport {
  pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
    self.reports.iter().map(|r| &r.outcome)
  }
}

#[derive(Clone)]
pub struct BatchDispatcher {
  processor: Arc<OrderProcessor>,
  max_in_flight: Option<usize>,
}

impl BatchDispatcher {
  pub fn new(processor: Arc<OrderProcessor>) -> Self {
    Self {
      processor,
      max_in_flight: None,
    }
  }

  /// Caps how many orders hold a transaction at once. `None` (or zero) runs
  /// the whole batch at once.
  pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
    self.max_in_flight = max_in_flight.filter(|n| *n > 0);
    self
  }

  /// Starts every request concurrently and returns once all have finished.
  /// One report per request, in input order, whatever happened to the others.
  #[instrument(name = "BatchDispatcher::dispatch", skip_all, fields(orders = requests.len()))]
  pub async fn dispatch(&self, requests: Vec<OrderRequest>) -> BatchReport {
    let started = Instant::now();
    let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));

    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
      let processor = Arc::clone(&self.processor);
      let limiter = limiter.clone();
      let fallback = (request.order_label.clone(), request.product_name.clone(), request.quantity);
      let handle = tokio::spawn(async move {
        let _permit = match limiter {
          Some(sem) => sem.acquire_owned().await.ok(),
          None => None,
        };
        processor.process(request).await
      });
      handles.push((fallback, handle));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for ((order_label, product_name, quantity), handle) in handles {
      let report = match handle.await {
        Ok(report) => report,
        Err(join_err) => {
          error!(order = %order_label, error = %join_err, "order task did not finish");
          let report = OrderReport {
            order_label,
            product_name,
            quantity,
            outcome: Outcome::Failed(Failure::internal(format!("order task aborted: {join_err}"))),
            attempts: 0,
            elapsed_ms: 0,
          };
          // The task died before its processor could report it.
          self.processor.sink().record(&report);
          report
        }
      };
      reports.push(report);
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let summary = BatchSummary::tally(&reports, elapsed_ms);
    info!(
      total = summary.total,
      committed = summary.committed,
      rejected = summary.rejected,
      failed = summary.failed,
      conflicts = summary.conflicts,
      elapsed_ms,
      "batch finished"
    );
    BatchReport { reports, summary }
  }
}
