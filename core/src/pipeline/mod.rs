// stockguard/src/pipeline/mod.rs

//! The `StepPlan<TData, Err>` type: construction, hook registration and execution.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::StepPlan;
