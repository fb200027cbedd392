// stockguard/src/error.rs
use crate::outcome::FailureKind;
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the step-plan engine itself, or by handlers registered on it.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Step not found: {step_name}")]
    StepNotFound { step_name: String },

    #[error("Handler missing for non-optional step: {step_name}")]
    HandlerMissing { step_name: String },

    #[error("Error in step handler or hook. Source: {source}")]
    HandlerError {
        #[source]
        source: AnyhowError,
    },

    #[error("Internal plan error: {0}")]
    Internal(String),
}

impl From<AnyhowError> for PlanError {
  fn from(err: AnyhowError) -> Self {
    PlanError::HandlerError { source: err }
  }
}

/// Failures surfaced by an inventory store or one of its transactions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not serialize access: {0}")]
    SerializationFailure(String),

    #[error("deadlock detected: {0}")]
    Deadlock(String),

    #[error("lock wait on '{resource}' timed out after {waited:?}")]
    LockTimeout { resource: String, waited: Duration },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("transaction {0} is no longer active")]
    TransactionClosed(u64),

    #[error("row not found: {0}")]
    RowMissing(String),

    #[error("store backend error: {source}")]
    Backend {
        #[source]
        source: AnyhowError,
    },
}

impl StoreError {
  /// Conflicts that a caller may retry: the transaction lost a race, not a rule.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      StoreError::SerializationFailure(_) | StoreError::Deadlock(_) | StoreError::LockTimeout { .. }
    )
  }

  pub fn kind(&self) -> FailureKind {
    match self {
      StoreError::SerializationFailure(_) | StoreError::Deadlock(_) | StoreError::LockTimeout { .. } => {
        FailureKind::Conflict
      }
      StoreError::Unavailable(_) => FailureKind::Unavailable,
      StoreError::ConstraintViolation(_) => FailureKind::Constraint,
      StoreError::TransactionClosed(_) | StoreError::RowMissing(_) | StoreError::Backend { .. } => {
        FailureKind::Internal
      }
    }
  }
}

/// Error type of the coordinator's step plan: either the store failed or a
/// handler/hook did.
#[derive(Debug, Error)]
pub enum TxnError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl From<AnyhowError> for TxnError {
  fn from(err: AnyhowError) -> Self {
    // A hook may wrap a StoreError in anyhow; keep it classifiable.
    match err.downcast::<StoreError>() {
      Ok(store_err) => TxnError::Store(store_err),
      Err(other) => TxnError::Plan(PlanError::from(other)),
    }
  }
}

impl TxnError {
  pub fn kind(&self) -> FailureKind {
    match self {
      TxnError::Store(e) => e.kind(),
      TxnError::Plan(_) => FailureKind::Internal,
    }
  }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
