// stockguard/src/flow/state.rs

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable state threaded through every handler of a step plan.
///
/// IMPORTANT: guards are blocking `parking_lot` guards and MUST be dropped
/// before any `.await`. Handlers copy what they need out of the guard, await the
/// store, then take a write guard to record the result.
#[derive(Debug)]
pub struct StepState<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> StepState<T> {
  pub fn new(data: T) -> Self {
    StepState(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Reads a value out of the state without keeping the guard alive.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.0.read())
  }

  /// Mutates the state in place without keeping the guard alive.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.0.write())
  }
}

impl<T: Send + Sync + 'static> Clone for StepState<T> {
  fn clone(&self) -> Self {
    StepState(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for StepState<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
