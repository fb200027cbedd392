// stockguard/src/flow/mod.rs

//! Building blocks shared by every step plan: the lockable step state, the
//! handler signature, step definitions and flow-control signals.

pub mod control;
pub mod handler;
pub mod state;
pub mod step;

pub use control::{PlanOutcome, StepControl};
pub use handler::StepHandler;
pub use state::StepState;
pub use step::{SkipCondition, StepDef};
