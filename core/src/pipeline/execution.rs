// fulfillment/src/pipeline/execution.rs

//! `Pipeline::run()`: executes steps in order against one shared context.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::PipelineError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

enum StepOutcome<Err> {
  Next,
  Stopped,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// A failing handler aborts the run unless its step is optional, in which
  /// case the error is logged and the next step starts.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_context_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step_execution",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );
      match self.run_step(step_def, &ctx_data).instrument(step_span).await {
        StepOutcome::Next => {}
        StepOutcome::Stopped => return Ok(PipelineResult::Stopped),
        StepOutcome::Failed(e) => return Err(e),
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> StepOutcome<Err> {
    let step_name = step_def.name.as_str();

    if let Some(skip_cond_fn) = &step_def.skip_if {
      if skip_cond_fn(ctx_data.clone()) {
        event!(Level::DEBUG, "Step skipped due to 'skip_if' condition.");
        return StepOutcome::Next;
      }
    }

    let has_handlers = [&self.before, &self.on, &self.after]
      .iter()
      .any(|table| table.get(step_name).map_or(false, |v| !v.is_empty()));
    if !has_handlers {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return StepOutcome::Next;
      }
      event!(Level::ERROR, "Non-optional step has no handlers.");
      return StepOutcome::Failed(Err::from(PipelineError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for (phase_name, table) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
      let Some(handlers) = table.get(step_name) else {
        continue;
      };
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        event!(Level::TRACE, phase = phase_name, handler_index = handler_idx, "Executing handler.");
        match handler_fn(ctx_data.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            event!(Level::INFO, phase = phase_name, "Pipeline stopped by a handler.");
            return StepOutcome::Stopped;
          }
          Err(e) if step_def.optional => {
            event!(Level::WARN, phase = phase_name, error = %e, "Handler of optional step failed; continuing.");
            return StepOutcome::Next;
          }
          Err(e) => {
            event!(Level::ERROR, phase = phase_name, error = %e, "Handler failed.");
            return StepOutcome::Failed(e);
          }
        }
      }
    }
    event!(Level::DEBUG, "Step processing finished.");
    StepOutcome::Next
  }
}
