// stockguard/src/coordinator.rs

//! The transaction coordinator: one order's check-and-decrement as a single
//! atomic unit of work.
//!
//! The work inside the transaction is a `StepPlan` over `OrderTxn`:
//!
//! ```text
//! load_product -> check_stock -> decrement_stock -> record_order -> hold_open
//! ```
//!
//! `Completed` commits, `Halted` means a business rejection was recorded and
//! rolls back, and any handler error rolls back and becomes `Outcome::Failed`.

use crate::error::{PlanError, TxnError};
use crate::flow::{PlanOutcome, StepControl, StepDef, StepState};
use crate::isolation::{IsolationLevel, ReadMode};
use crate::model::{Order, OrderRequest, Product};
use crate::outcome::{Failure, Outcome, Rejection};
use crate::pipeline::StepPlan;
use crate::store::{InventoryStore, StoreTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const LOAD_PRODUCT: &str = "load_product";
pub const CHECK_STOCK: &str = "check_stock";
pub const DECREMENT_STOCK: &str = "decrement_stock";
pub const RECORD_ORDER: &str = "record_order";
pub const HOLD_OPEN: &str = "hold_open";

/// Per-coordinator knobs.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorSettings {
  pub isolation: IsolationLevel,
  pub read_mode: ReadMode,
  /// How long a flagged request keeps its transaction open before commit.
  pub hold: Duration,
}

impl CoordinatorSettings {
  pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
    self.isolation = isolation;
    self
  }

  pub fn read_mode(mut self, read_mode: ReadMode) -> Self {
    self.read_mode = read_mode;
    self
  }

  pub fn hold(mut self, hold: Duration) -> Self {
    self.hold = hold;
    self
  }
}

/// State shared by the steps of one order's transaction.
pub struct OrderTxn {
  pub request: OrderRequest,
  pub txn: Arc<dyn StoreTransaction>,
  pub read_mode: ReadMode,
  pub hold: Duration,
  pub product: Option<Product>,
  pub remaining: Option<i64>,
  pub order: Option<Order>,
  pub rejection: Option<Rejection>,
}

impl OrderTxn {
  fn halt_with(&mut self, rejection: Rejection) -> StepControl {
    self.rejection = Some(rejection);
    StepControl::Halt
  }
}

pub type OrderPlan = StepPlan<OrderTxn, TxnError>;

pub struct TransactionCoordinator {
  store: Arc<dyn InventoryStore>,
  settings: CoordinatorSettings,
  plan: OrderPlan,
}

impl TransactionCoordinator {
  pub fn new(store: Arc<dyn InventoryStore>, settings: CoordinatorSettings) -> Self {
    Self {
      store,
      settings,
      plan: order_plan(),
    }
  }

  pub fn settings(&self) -> &CoordinatorSettings {
    &self.settings
  }

  pub fn store(&self) -> &Arc<dyn InventoryStore> {
    &self.store
  }

  /// Access to the step plan, for registering extra `before`/`after` hooks on
  /// the named steps.
  pub fn plan_mut(&mut self) -> &mut OrderPlan {
    &mut self.plan
  }

  /// Runs one order inside its own transaction and reports what happened.
  /// Never returns an error: every failure is an `Outcome::Failed`.
  #[instrument(
    name = "TransactionCoordinator::process_order",
    skip_all,
    fields(
      order = %request.order_label,
      product = %request.product_name,
      quantity = request.quantity,
      isolation = %self.settings.isolation,
    )
  )]
  pub async fn process_order(&self, request: &OrderRequest) -> Outcome {
    if request.quantity <= 0 {
      let rejection = Rejection::InvalidQuantity {
        quantity: request.quantity,
      };
      info!(reason = %rejection, "order rejected before opening a transaction");
      return Outcome::Rejected(rejection);
    }

    let txn = match self.store.begin(self.settings.isolation).await {
      Ok(txn) => txn,
      Err(e) => {
        warn!(error = %e, "could not begin transaction");
        return Outcome::Failed(Failure::from(&e));
      }
    };
    debug!(txn = txn.id(), backend = self.store.backend_name(), "transaction opened");

    let state = StepState::new(OrderTxn {
      request: request.clone(),
      txn: Arc::clone(&txn),
      read_mode: self.settings.read_mode,
      hold: self.settings.hold,
      product: None,
      remaining: None,
      order: None,
      rejection: None,
    });

    match self.plan.run(state.clone()).await {
      Ok(PlanOutcome::Completed) => match txn.commit().await {
        Ok(()) => match state.update(|s| s.order.take()) {
          Some(order) => {
            debug!(txn = txn.id(), order_id = order.id, "transaction committed");
            Outcome::Committed(order)
          }
          None => {
            warn!(txn = txn.id(), "plan completed without recording an order");
            Outcome::Failed(Failure::internal("transaction committed without an order row"))
          }
        },
        Err(e) => {
          warn!(txn = txn.id(), error = %e, "commit failed");
          rollback_quietly(txn.as_ref()).await;
          Outcome::Failed(Failure::from(&e))
        }
      },
      Ok(PlanOutcome::Halted) => {
        rollback_quietly(txn.as_ref()).await;
        match state.update(|s| s.rejection.take()) {
          Some(rejection) => {
            info!(reason = %rejection, "order rejected");
            Outcome::Rejected(rejection)
          }
          None => Outcome::Failed(Failure::internal("transaction halted without a rejection reason")),
        }
      }
      Err(e) => {
        warn!(txn = txn.id(), error = %e, "order transaction failed");
        rollback_quietly(txn.as_ref()).await;
        Outcome::Failed(Failure::from(&e))
      }
    }
  }
}

async fn rollback_quietly(txn: &dyn StoreTransaction) {
  if let Err(e) = txn.rollback().await {
    warn!(txn = txn.id(), error = %e, "rollback failed");
  } else {
    debug!(txn = txn.id(), "transaction rolled back");
  }
}

/// Builds the five-step plan every order runs.
fn order_plan() -> OrderPlan {
  let mut plan = OrderPlan::new(vec![
    StepDef::new(LOAD_PRODUCT),
    StepDef::new(CHECK_STOCK),
    StepDef::new(DECREMENT_STOCK),
    StepDef::new(RECORD_ORDER),
    StepDef::new(HOLD_OPEN)
      .optional()
      .skip_if(|state: StepState<OrderTxn>| state.with(|s| !s.request.simulate_delay || s.hold.is_zero())),
  ]);

  register_handlers(&mut plan).unwrap_or_else(|e| unreachable!("order plan steps are fixed: {e}"));
  plan
}

fn register_handlers(plan: &mut OrderPlan) -> Result<(), PlanError> {
  plan.on(LOAD_PRODUCT, |state: StepState<OrderTxn>| async move {
    let (txn, name, mode) = state.with(|s| (Arc::clone(&s.txn), s.request.product_name.clone(), s.read_mode));
    let found = txn.find_product(&name, mode).await?;
    Ok::<_, TxnError>(state.update(|s| match found {
      Some(product) => {
        s.product = Some(product);
        StepControl::Continue
      }
      None => s.halt_with(Rejection::ProductNotFound { product: name }),
    }))
  })?;

  plan.on(CHECK_STOCK, |state: StepState<OrderTxn>| async move {
    Ok::<_, TxnError>(state.update(|s| {
      let available = s.product.as_ref().map_or(0, |p| p.quantity);
      let remaining = available - s.request.quantity;
      if remaining < 0 {
        return s.halt_with(Rejection::InsufficientStock {
          product: s.request.product_name.clone(),
          requested: s.request.quantity,
          available,
        });
      }
      s.remaining = Some(remaining);
      StepControl::Continue
    }))
  })?;

  plan.on(DECREMENT_STOCK, |state: StepState<OrderTxn>| async move {
    let (txn, name, quantity) = state.with(|s| (Arc::clone(&s.txn), s.request.product_name.clone(), s.request.quantity));
    let written = txn.decrement_quantity(&name, quantity).await?;
    state.update(|s| {
      if s.remaining != Some(written) {
        // Another writer got in between our read and our write.
        debug!(expected = ?s.remaining, written, "decrement landed on a different base quantity");
      }
      s.remaining = Some(written);
    });
    Ok::<_, TxnError>(StepControl::Continue)
  })?;

  plan.on(RECORD_ORDER, |state: StepState<OrderTxn>| async move {
    let (txn, new_order) = state.with(|s| (Arc::clone(&s.txn), s.request.to_new_order()));
    let order = txn.insert_order(new_order).await?;
    state.update(|s| s.order = Some(order));
    Ok::<_, TxnError>(StepControl::Continue)
  })?;

  plan.on(HOLD_OPEN, |state: StepState<OrderTxn>| async move {
    let hold = state.with(|s| s.hold);
    debug!(?hold, "holding transaction open");
    tokio::time::sleep(hold).await;
    Ok::<_, TxnError>(StepControl::Continue)
  })?;

  Ok(())
}
