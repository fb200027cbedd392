// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use stockguard::{PlanError, PlanOutcome, StepControl, StepDef, StepPlan, StepState};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type TestPlan = StepPlan<TestState, TestError>;

#[tokio::test]
#[serial]
async fn test_plan_runs_steps_in_order() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["step1", "step2", "step3"]);
  plan.on("step1", recording_handler("step1", " S1")).unwrap();
  plan.on("step2", recording_handler("step2", " S2")).unwrap();
  plan.on("step3", recording_handler("step3", " S3")).unwrap();

  let state = StepState::new(TestState::default());
  let result = plan.run(state.clone()).await;

  assert_eq!(result.unwrap(), PlanOutcome::Completed);
  let guard = state.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " S1 S2 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["only"]);
  plan.after("only", recording_handler("after", "C")).unwrap();
  plan.on("only", recording_handler("on", "B")).unwrap();
  plan.before("only", recording_handler("before", "A")).unwrap();

  let state = StepState::new(TestState::default());
  plan.run(state.clone()).await.unwrap();

  assert_eq!(state.read().message, "ABC");
}

#[tokio::test]
#[serial]
async fn test_halt_stops_remaining_steps() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["stepA", "haltStep", "stepC"]);
  plan.on("stepA", recording_handler("stepA", "A")).unwrap();
  plan.on("haltStep", recording_handler("haltStep", "H")).unwrap();
  plan.on("stepC", recording_handler("stepC", "C")).unwrap();

  let state = StepState::new(TestState {
    halt_at: Some("haltStep".to_string()),
    ..Default::default()
  });
  let result = plan.run(state.clone()).await;

  assert_eq!(result.unwrap(), PlanOutcome::Halted);
  assert_eq!(state.read().steps_executed, vec!["stepA", "haltStep"]);
}

#[tokio::test]
#[serial]
async fn test_halt_in_before_skips_on_handlers() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["guarded"]);
  plan
    .before("guarded", |_state: StepState<TestState>| async move {
      Ok::<_, TestError>(StepControl::Halt)
    })
    .unwrap();
  plan.on("guarded", recording_handler("guarded", "X")).unwrap();

  let state = StepState::new(TestState::default());
  assert_eq!(plan.run(state.clone()).await.unwrap(), PlanOutcome::Halted);
  assert_eq!(state.read().counter, 0);
}

#[tokio::test]
#[serial]
async fn test_handler_error_propagates_and_stops_plan() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["good_step", "bad_step", "another_step"]);
  plan.on("good_step", recording_handler("good_step", "Good")).unwrap();
  plan
    .on("bad_step", |_state: StepState<TestState>| async move {
      Err::<StepControl, _>(TestError::Handler("I am a bad step!".to_string()))
    })
    .unwrap();
  plan.on("another_step", recording_handler("another_step", "NeverRun")).unwrap();

  let state = StepState::new(TestState::default());
  let result = plan.run(state.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("I am a bad step!".to_string()));
  assert_eq!(state.read().steps_executed, vec!["good_step"]);
}

#[tokio::test]
#[serial]
async fn test_required_step_without_handlers_is_handler_missing() {
  setup_tracing();
  let plan = TestPlan::from_names(&["missing"]);
  let err = plan.run(StepState::new(TestState::default())).await.unwrap_err();
  match err {
    TestError::Plan(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut plan = TestPlan::new(vec![StepDef::new("first"), StepDef::new("maybe").optional(), StepDef::new("last")]);
  plan.on("first", recording_handler("first", "1")).unwrap();
  plan.on("last", recording_handler("last", "3")).unwrap();

  let state = StepState::new(TestState::default());
  assert_eq!(plan.run(state.clone()).await.unwrap(), PlanOutcome::Completed);
  assert_eq!(state.read().steps_executed, vec!["first", "last"]);
}

#[tokio::test]
#[serial]
async fn test_skip_condition_is_evaluated_against_current_state() {
  setup_tracing();
  let mut plan = TestPlan::new(vec![
    StepDef::new("bump"),
    StepDef::new("only_if_small").skip_if(|state: StepState<TestState>| state.with(|s| s.counter >= 1)),
  ]);
  plan.on("bump", recording_handler("bump", "b")).unwrap();
  plan.on("only_if_small", recording_handler("only_if_small", "s")).unwrap();

  let state = StepState::new(TestState::default());
  plan.run(state.clone()).await.unwrap();
  assert_eq!(state.read().steps_executed, vec!["bump"]);
}

#[tokio::test]
#[serial]
async fn test_registering_on_unknown_step_fails() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["known"]);
  let err = plan.on("unknown", recording_handler("unknown", "")).unwrap_err();
  assert!(matches!(err, PlanError::StepNotFound { ref step_name } if step_name == "unknown"));
}

#[tokio::test]
#[serial]
async fn test_insert_after_step_runs_inserted_step() {
  setup_tracing();
  let mut plan = TestPlan::from_names(&["a", "c"]);
  plan.insert_after_step("a", StepDef::new("b")).unwrap();
  assert_eq!(plan.step_names(), vec!["a", "b", "c"]);

  for name in ["a", "b", "c"] {
    plan.on(name, recording_handler(name, name)).unwrap();
  }
  let state = StepState::new(TestState::default());
  plan.run(state.clone()).await.unwrap();
  assert_eq!(state.read().message, "abc");

  assert!(plan.insert_after_step("a", StepDef::new("c")).is_err());
  assert!(plan.insert_after_step("nope", StepDef::new("d")).is_err());
}

#[tokio::test]
#[serial]
async fn test_plan_is_reusable_across_concurrent_runs() {
  setup_tracing();
  let runs = Arc::new(AtomicUsize::new(0));
  let mut plan = TestPlan::from_names(&["count"]);
  let counter = runs.clone();
  plan
    .on("count", move |state: StepState<TestState>| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        state.update(|s| s.counter += 1);
        tokio::task::yield_now().await;
        Ok::<_, TestError>(StepControl::Continue)
      }
    })
    .unwrap();

  let plan = Arc::new(plan);
  let mut handles = Vec::new();
  for _ in 0..8 {
    let plan = plan.clone();
    handles.push(tokio::spawn(async move {
      let state = StepState::new(TestState::default());
      plan.run(state.clone()).await.unwrap();
      let counter = state.read().counter;
      counter
    }));
  }
  for handle in handles {
    assert_eq!(handle.await.unwrap(), 1);
  }
  assert_eq!(runs.load(Ordering::SeqCst), 8);
}
