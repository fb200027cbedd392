// stockguard/src/outcome.rs

//! Result values for one order. Business rejections and store failures are
//! both plain values here; nothing past the order processor is an `Err`.

use crate::error::{StoreError, TxnError};
use crate::model::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final result of running one request through the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
  /// Decrement and ledger insert committed together.
  Committed(Order),
  /// A business rule refused the order. Terminal, never retried.
  Rejected(Rejection),
  /// The store or the plan failed; everything was rolled back.
  Failed(Failure),
}

impl Outcome {
  pub fn kind_str(&self) -> &'static str {
    match self {
      Outcome::Committed(_) => "committed",
      Outcome::Rejected(_) => "rejected",
      Outcome::Failed(_) => "failed",
    }
  }

  pub fn is_committed(&self) -> bool {
    matches!(self, Outcome::Committed(_))
  }

  pub fn committed_order(&self) -> Option<&Order> {
    match self {
      Outcome::Committed(order) => Some(order),
      _ => None,
    }
  }

  pub fn rejection(&self) -> Option<&Rejection> {
    match self {
      Outcome::Rejected(rejection) => Some(rejection),
      _ => None,
    }
  }

  pub fn failure(&self) -> Option<&Failure> {
    match self {
      Outcome::Failed(failure) => Some(failure),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
  ProductNotFound { product: String },
  InsufficientStock { product: String, requested: i64, available: i64 },
  InvalidQuantity { quantity: i64 },
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Rejection::ProductNotFound { .. } => write!(f, "product not found"),
      Rejection::InsufficientStock {
        requested, available, ..
      } => write!(f, "insufficient stock: wanted {} but only {} available", requested, available),
      Rejection::InvalidQuantity { quantity } => {
        write!(f, "invalid quantity: {} (must be positive)", quantity)
      }
    }
  }
}

/// Failure classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// Serialization failure, deadlock or lock-wait timeout. Retryable.
  Conflict,
  /// The store could not be reached.
  Unavailable,
  /// A store constraint refused the write.
  Constraint,
  Internal,
}

impl fmt::Display for FailureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      FailureKind::Conflict => "store_conflict",
      FailureKind::Unavailable => "store_unavailable",
      FailureKind::Constraint => "constraint",
      FailureKind::Internal => "internal",
    };
    f.write_str(s)
  }
}

/// Cloneable record of a failed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
  pub kind: FailureKind,
  pub message: String,
}

impl Failure {
  pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(FailureKind::Internal, message)
  }

  pub fn is_transient(&self) -> bool {
    self.kind == FailureKind::Conflict
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.kind, self.message)
  }
}

impl From<&StoreError> for Failure {
  fn from(err: &StoreError) -> Self {
    Failure::new(err.kind(), err.to_string())
  }
}

impl From<&TxnError> for Failure {
  fn from(err: &TxnError) -> Self {
    Failure::new(err.kind(), err.to_string())
  }
}
