// src/lib.rs

//! Stockguard: concurrent stock-decrement orders against an inventory table
//! under a configurable transaction isolation level.
//!
//! The pieces, from the inside out:
//!  - An `InventoryStore` opens transactions; `MemoryStore` is an in-process
//!    engine with row locks and versioned rows for every isolation level.
//!  - The `TransactionCoordinator` runs one order as a step plan inside one
//!    transaction: load product, check stock, decrement, record order, and an
//!    optional hold before commit.
//!  - The `OrderProcessor` turns every result into an `Outcome` and retries
//!    store conflicts under a `RetryPolicy`.
//!  - The `BatchDispatcher` fans a batch out concurrently and collects every
//!    outcome.

pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod flow;
pub mod isolation;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod processor;
pub mod retry;
pub mod sink;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::flow::{PlanOutcome, SkipCondition, StepControl, StepDef, StepHandler, StepState};
pub use crate::pipeline::StepPlan;

pub use crate::coordinator::{CoordinatorSettings, OrderPlan, OrderTxn, TransactionCoordinator};
pub use crate::dispatcher::{BatchDispatcher, BatchReport, BatchSummary};
pub use crate::processor::{OrderProcessor, OrderReport};
pub use crate::retry::RetryPolicy;
pub use crate::sink::{FanoutSink, MemorySink, OutcomeSink, TracingSink};

pub use crate::isolation::{IsolationLevel, ReadMode};
pub use crate::model::{NewOrder, Order, OrderRequest, Product};
pub use crate::outcome::{Failure, FailureKind, Outcome, Rejection};
pub use crate::store::{InventoryStore, MemoryStore, MemoryStoreOptions, StoreTransaction};

pub use crate::error::{PlanError, StoreError, StoreResult, TxnError};
