// stockguard/src/pipeline/execution.rs

//! `StepPlan::run()`: executes steps in order against a shared state.

use crate::error::PlanError;
use crate::flow::control::{PlanOutcome, StepControl};
use crate::flow::handler::StepHandler;
use crate::flow::state::StepState;
use crate::pipeline::definition::StepPlan;
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> StepPlan<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PlanError> + Send + Sync + 'static,
{
  /// Executes the plan against `state`.
  ///
  /// Returns `PlanOutcome::Halted` as soon as any handler halts, the first
  /// handler error as `Err`, and `PlanOutcome::Completed` otherwise. A
  /// non-optional step with no handlers at all is a `PlanError::HandlerMissing`.
  #[instrument(
    name = "StepPlan::run",
    skip_all,
    fields(
      state_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, state: StepState<TData>) -> Result<PlanOutcome, Err> {
    event!(Level::DEBUG, "Plan execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(
        Level::INFO,
        "txn_step",
        step_name = step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond) = &step_def.skip_if {
        if skip_cond(state.clone()) {
          event!(parent: &step_span, Level::DEBUG, "Step skipped by its skip condition.");
          continue;
        }
      }

      let before = self.before.get(step_name).filter(|v| !v.is_empty());
      let on = self.on.get(step_name).filter(|v| !v.is_empty());
      let after = self.after.get(step_name).filter(|v| !v.is_empty());

      if before.is_none() && on.is_none() && after.is_none() {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Non-optional step has no handlers.");
        return Err(Err::from(PlanError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      for (phase, handlers) in [("before", before), ("on", on), ("after", after)] {
        let Some(handlers) = handlers else { continue };
        let control = run_phase(phase, handlers, &state).instrument(step_span.clone()).await?;
        if control == StepControl::Halt {
          event!(parent: &step_span, Level::INFO, phase, "Plan halted by a handler.");
          return Ok(PlanOutcome::Halted);
        }
      }
      event!(parent: &step_span, Level::DEBUG, "Step finished.");
    }

    event!(Level::DEBUG, "Plan execution completed.");
    Ok(PlanOutcome::Completed)
  }
}

async fn run_phase<TData, Err>(
  phase: &'static str,
  handlers: &[StepHandler<TData, Err>],
  state: &StepState<TData>,
) -> Result<StepControl, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    match handler_fn(state.clone()).await {
      Ok(StepControl::Continue) => {}
      Ok(StepControl::Halt) => return Ok(StepControl::Halt),
      Err(e) => {
        event!(Level::ERROR, phase, handler_index = handler_idx, error = %e, "Step handler failed.");
        return Err(e);
      }
    }
  }
  Ok(StepControl::Continue)
}
