// storefront/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod views;
pub mod webhook_handlers;

use orka::{ContextData, PipelineResult};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Runs the pipeline registered for `T`. None of the service pipelines stop early, so a
/// `Stopped` result means a handler misbehaved.
pub(crate) async fn run_pipeline<T>(app_state: &AppState, ctx: &ContextData<T>, operation: &str) -> Result<(), AppError>
where
  T: Send + Sync + 'static,
{
  match app_state.orka_instance.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => Ok(()),
    Ok(PipelineResult::Stopped) => {
      warn!(operation, "Pipeline stopped before completing.");
      Err(AppError::Internal(format!("{} did not complete", operation)))
    }
    Err(app_err) => {
      warn!(operation, error = %app_err, "Pipeline failed.");
      Err(app_err)
    }
  }
}

/// Total page count for a listing; at least one page even when empty.
pub(crate) fn page_count(total: i64, limit: i64) -> i64 {
  if limit <= 0 {
    return 1;
  }
  ((total + limit - 1) / limit).max(1)
}
