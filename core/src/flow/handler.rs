// stockguard/src/flow/handler.rs

use crate::flow::control::StepControl;
use crate::flow::state::StepState;
use std::future::Future;
use std::pin::Pin;

/// Type alias for a step handler.
///
/// A handler takes a clone of the plan's `StepState<TData>` and returns a boxed
/// future resolving to `Result<StepControl, Err>`. Handlers must release any
/// state guard before awaiting.
pub type StepHandler<TData, Err> = Box<
  dyn Fn(StepState<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>>
    + Send
    + Sync,
>;
