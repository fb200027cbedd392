// stockguard/src/pipeline/hooks.rs

//! Registration of `before`, `on` and `after` handlers for plan steps.

use crate::error::PlanError;
use crate::flow::control::StepControl;
use crate::flow::handler::StepHandler;
use crate::flow::state::StepState;
use crate::pipeline::definition::StepPlan;
use std::collections::HashMap;
use std::future::Future;

impl<TData, Err> StepPlan<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PlanError> + Send + Sync + 'static,
{
  /// Registers a handler that runs before the step's `on` handlers.
  ///
  /// The handler may return any error convertible into the plan's `Err`.
  pub fn before<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(StepState<TData>) -> F + Send + Sync + 'static,
  ) -> Result<(), PlanError>
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name)?;
    push_handler(&mut self.before, step_name, box_handler(handler_fn));
    Ok(())
  }

  /// Registers a primary handler for the step.
  pub fn on<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(StepState<TData>) -> F + Send + Sync + 'static,
  ) -> Result<(), PlanError>
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name)?;
    push_handler(&mut self.on, step_name, box_handler(handler_fn));
    Ok(())
  }

  /// Registers a handler that runs after the step's `on` handlers.
  pub fn after<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(StepState<TData>) -> F + Send + Sync + 'static,
  ) -> Result<(), PlanError>
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name)?;
    push_handler(&mut self.after, step_name, box_handler(handler_fn));
    Ok(())
  }
}

fn box_handler<TData, Err, F, HandlerErr>(
  handler_fn: impl Fn(StepState<TData>) -> F + Send + Sync + 'static,
) -> StepHandler<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: Send + 'static,
  F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
  HandlerErr: Into<Err> + Send + Sync + 'static,
{
  Box::new(move |state| {
    let fut = handler_fn(state);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}

fn push_handler<TData: Send + Sync + 'static, Err>(
  table: &mut HashMap<String, Vec<StepHandler<TData, Err>>>,
  step_name: &str,
  handler: StepHandler<TData, Err>,
) {
  table.entry(step_name.to_string()).or_default().push(handler);
}
