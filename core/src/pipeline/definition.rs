// stockguard/src/pipeline/definition.rs

//! Contains the `StepPlan<TData, Err>` struct and its structural operations.

use crate::error::PlanError;
use crate::flow::handler::StepHandler;
use crate::flow::step::{SkipCondition, StepDef};
use std::collections::HashMap;

/// An ordered list of named steps, each with `before`, `on` and `after`
/// handler lists, run against a shared `StepState<TData>`.
///
/// `Err` is the error type handlers return. It must be `From<PlanError>` so
/// that engine-level failures (a non-optional step without handlers) surface
/// through the same channel.
pub struct StepPlan<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PlanError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<StepHandler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<StepHandler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<StepHandler<TData, Err>>>,
}

impl<TData, Err> StepPlan<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PlanError> + Send + Sync + 'static,
{
  pub fn new(steps: Vec<StepDef<TData>>) -> Self {
    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Builds a plan of required steps with no skip conditions.
  pub fn from_names(names: &[&str]) -> Self {
    Self::new(names.iter().map(|name| StepDef::new(*name)).collect())
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn contains_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  pub(crate) fn ensure_step_exists(&self, step_name: &str) -> Result<(), PlanError> {
    if self.contains_step(step_name) {
      Ok(())
    } else {
      Err(PlanError::StepNotFound {
        step_name: step_name.to_string(),
      })
    }
  }

  /// Inserts `new_step` directly after `existing_step_name`.
  pub fn insert_after_step(&mut self, existing_step_name: &str, new_step: StepDef<TData>) -> Result<(), PlanError> {
    if self.contains_step(&new_step.name) {
      return Err(PlanError::Internal(format!(
        "step '{}' already exists in the plan",
        new_step.name
      )));
    }
    let idx = self
      .steps
      .iter()
      .position(|s| s.name == existing_step_name)
      .ok_or_else(|| PlanError::StepNotFound {
        step_name: existing_step_name.to_string(),
      })?;
    self.steps.insert(idx + 1, new_step);
    Ok(())
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) -> Result<(), PlanError> {
    let step = self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| PlanError::StepNotFound {
        step_name: step_name.to_string(),
      })?;
    step.skip_if = skip_if;
    Ok(())
  }
}
