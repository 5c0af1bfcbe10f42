// tests/error_handling_tests.rs
mod common;
use common::*;
use fulfillment::{ContextData, FulfillmentError, Pipeline, PipelineControl, PipelineError, PipelineResult};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_pipeline_run_catches_handler_missing() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("missing", false, None)]);
  let ctx = ContextData::new(TestContext::default());
  match pipeline.run(ctx).await {
    Err(TestError::Engine(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("Expected TestError::Engine(HandlerMissing), got {:?}", other),
  }
}

// A pipeline whose error type is the domain error, as the orchestrator uses it.
#[tokio::test]
#[serial]
async fn test_pipeline_with_fulfillment_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FulfillmentError>::new(&[("task", false, None)]);

  pipeline.on_root("task", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().counter = 1;
      Ok::<PipelineControl, FulfillmentError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().counter, 1);

  let order_id = Uuid::new_v4();
  let mut failing_pipeline = Pipeline::<TestContext, FulfillmentError>::new(&[("fail_task", false, None)]);
  failing_pipeline.on_root("fail_task", move |_ctx: ContextData<TestContext>| {
    Box::pin(async move { Err::<PipelineControl, _>(FulfillmentError::OrderNotFound { order_id }) })
  });
  match failing_pipeline.run(ContextData::new(TestContext::default())).await {
    Err(FulfillmentError::OrderNotFound { order_id: got }) => assert_eq!(got, order_id),
    other => panic!("Expected FulfillmentError::OrderNotFound, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_engine_errors_surface_as_workflow_errors() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, FulfillmentError>::new(&[("unwired", false, None)]);
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  assert!(matches!(
    result,
    Err(FulfillmentError::Workflow(PipelineError::HandlerMissing { ref step_name })) if step_name == "unwired"
  ));
  assert!(!result.unwrap_err().is_retryable());
}

#[test]
fn test_incomplete_fulfillment_keeps_its_cause() {
  let order_id = Uuid::new_v4();
  let err = FulfillmentError::FulfillmentIncomplete {
    order_id,
    source: Box::new(FulfillmentError::persistence(anyhow::anyhow!("disk full"))),
  };
  let rendered = err.to_string();
  assert!(rendered.contains(&order_id.to_string()));
  assert!(rendered.contains("disk full"));
  assert!(std::error::Error::source(&err).is_some());
}
