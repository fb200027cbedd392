// stockguard/src/flow/step.rs

//! Defines the structure for a single step within a plan.

use super::StepState;

/// Skip predicate evaluated right before a step runs. `true` skips the step.
pub type SkipCondition<TData> = std::sync::Arc<dyn Fn(StepState<TData>) -> bool + Send + Sync + 'static>;

/// Definition of a plan step: its name, whether it may run without handlers,
/// and an optional skip predicate.
#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: false,
      skip_if: None,
    }
  }

  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn skip_if(mut self, condition: impl Fn(StepState<T>) -> bool + Send + Sync + 'static) -> Self {
    self.skip_if = Some(std::sync::Arc::new(condition));
    self
  }
}

// SkipCondition is an Arc<dyn Fn>, so Debug is written by hand.
impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
