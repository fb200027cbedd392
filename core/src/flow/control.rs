// stockguard/src/flow/control.rs

//! Signals for controlling plan flow and the outcome of a plan run.

/// Signal from a step handler indicating whether the plan should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Continue with the remaining handlers of this step and the steps after it.
  Continue,
  /// Halt the plan immediately. No further handlers or steps run.
  ///
  /// The coordinator uses this for business rejections: the handler records
  /// the rejection in the step state and halts, and the transaction is rolled back.
  Halt,
}

/// Outcome of a full plan execution that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
  /// Every non-skipped step ran to completion.
  Completed,
  /// A handler returned `StepControl::Halt`.
  Halted,
}
