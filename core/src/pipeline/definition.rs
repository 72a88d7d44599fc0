// src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its construction.

use crate::core::context::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::OrkaError;
use std::collections::HashMap;
use tracing::{event, Level};

/// An ordered set of steps over the context data type `TData`.
///
/// Handlers return `Result<PipelineControl, Err>`. `Err` must absorb `OrkaError` so that
/// engine-level failures (missing handlers, bad wiring) surface through the same type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<OrkaError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,

  // Handlers registered against names that are not steps. Reported by `run`.
  pub(crate) unknown_steps: Vec<String>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<OrkaError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples, in execution order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_cond_opt)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_cond_opt.clone(),
      })
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
      unknown_steps: Vec::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub(crate) fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Records a wiring mistake instead of panicking; the next `run` fails with it.
  pub(crate) fn note_unknown_step(&mut self, step_name: &str) {
    event!(Level::ERROR, %step_name, "Handler registered for a step that is not part of the pipeline.");
    self.unknown_steps.push(step_name.to_string());
  }

  pub(crate) fn wiring_error(&self) -> Option<OrkaError> {
    self.unknown_steps.first().map(|step_name| OrkaError::ConfigurationError {
      step_name: step_name.clone(),
      message: "handler registered for unknown step".to_string(),
    })
  }
}
