// stockguard/src/retry.rs

//! Backoff policy for orders that lost a store conflict.
//!
//! Only transient failures (serialization failure, deadlock, lock timeout)
//! are ever retried; business rejections and unavailability never are. The
//! default policy retries nothing.

use crate::outcome::Failure;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Retries after the first attempt. Zero disables retrying.
  pub max_retries: usize,
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub multiplier: f64,
  /// Fraction of each delay (0.0..=1.0) randomised so conflicting orders do
  /// not retry in lockstep.
  pub jitter: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::none()
  }
}

impl RetryPolicy {
  pub const fn none() -> Self {
    Self {
      max_retries: 0,
      initial_delay: Duration::from_millis(10),
      max_delay: Duration::from_secs(1),
      multiplier: 2.0,
      jitter: 0.5,
    }
  }

  pub const fn builder() -> RetryPolicyBuilder {
    RetryPolicyBuilder { policy: Self::none() }
  }

  pub fn should_retry(&self, failure: &Failure, attempts_so_far: usize) -> bool {
    failure.is_transient() && attempts_so_far <= self.max_retries
  }

  /// Delay before retry number `retry` (zero-based), without jitter:
  /// `initial_delay * multiplier ^ retry`, capped at `max_delay`.
  pub fn base_delay(&self, retry: usize) -> Duration {
    let exp = i32::try_from(retry).unwrap_or(i32::MAX);
    let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
    if !millis.is_finite() || millis >= self.max_delay.as_millis() as f64 {
      return self.max_delay;
    }
    Duration::from_millis(millis as u64)
  }

  /// `base_delay` with up to `jitter` of it shaved off at random.
  pub fn delay_for_retry(&self, retry: usize) -> Duration {
    let base = self.base_delay(retry);
    // The field is public, so it may not have come through the builder.
    let jitter = if self.jitter.is_finite() { self.jitter.clamp(0.0, 1.0) } else { 0.0 };
    if jitter == 0.0 || base.is_zero() {
      return base;
    }
    let factor = 1.0 - rand::thread_rng().gen_range(0.0..=jitter);
    base.mul_f64(factor)
  }
}

#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
  policy: RetryPolicy,
}

impl RetryPolicyBuilder {
  pub const fn max_retries(mut self, max_retries: usize) -> Self {
    self.policy.max_retries = max_retries;
    self
  }

  pub const fn initial_delay(mut self, delay: Duration) -> Self {
    self.policy.initial_delay = delay;
    self
  }

  pub const fn max_delay(mut self, delay: Duration) -> Self {
    self.policy.max_delay = delay;
    self
  }

  pub const fn multiplier(mut self, multiplier: f64) -> Self {
    self.policy.multiplier = multiplier;
    self
  }

  /// Clamped to `0.0..=1.0`; a non-finite value disables jitter.
  pub fn jitter(mut self, jitter: f64) -> Self {
    self.policy.jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
    self
  }

  pub fn build(self) -> RetryPolicy {
    self.policy
  }
}
