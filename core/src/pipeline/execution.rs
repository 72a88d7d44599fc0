// src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps and drives their handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::OrkaError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, info_span, instrument, Instrument, Level};

enum StepOutcome<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<OrkaError> + Send + Sync + 'static,
{
  /// Executes the pipeline against `ctx_data`.
  ///
  /// A failure in a required step aborts the run and is returned. A failure in an optional
  /// step is logged and the run continues with the next step.
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
    if let Some(wiring_err) = self.wiring_error() {
      return Err(Err::from(wiring_err));
    }

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = info_span!(
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      if step_def.should_skip(&ctx_data) {
        event!(parent: &step_span, Level::DEBUG, "Step skipped by 'skip_if' condition.");
        continue;
      }

      let outcome = self.run_step(step_def, &ctx_data).instrument(step_span.clone()).await;
      match outcome {
        StepOutcome::Continue => {}
        StepOutcome::Stop => {
          event!(parent: &step_span, Level::INFO, "Pipeline stopped by handler.");
          return Ok(PipelineResult::Stopped);
        }
        StepOutcome::Failed(e) if step_def.optional => {
          event!(parent: &step_span, Level::WARN, error = %e, "Optional step failed; continuing.");
        }
        StepOutcome::Failed(e) => {
          event!(parent: &step_span, Level::ERROR, error = %e, "Step failed.");
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> StepOutcome<Err> {
    let name = step_def.name.as_str();
    let phases = [self.before.get(name), self.on.get(name), self.after.get(name)];

    if phases.iter().all(|handlers| handlers.map_or(true, |v| v.is_empty())) {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return StepOutcome::Continue;
      }
      return StepOutcome::Failed(Err::from(OrkaError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for handlers in phases.into_iter().flatten() {
      match run_handlers(handlers, ctx_data).await {
        StepOutcome::Continue => {}
        other => return other,
      }
    }
    StepOutcome::Continue
  }
}

async fn run_handlers<TData, Err>(handlers: &[Handler<TData, Err>], ctx_data: &ContextData<TData>) -> StepOutcome<Err>
where
  TData: 'static + Send + Sync,
{
  for handler_fn in handlers {
    match handler_fn(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return StepOutcome::Stop,
      Err(e) => return StepOutcome::Failed(e),
    }
  }
  StepOutcome::Continue
}
