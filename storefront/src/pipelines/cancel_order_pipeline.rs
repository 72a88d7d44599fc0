// storefront/src/pipelines/cancel_order_pipeline.rs
use orka::{ContextData, Orka, Pipeline, PipelineControl};
use tracing::{info, instrument, warn};

use crate::db::CancelOutcome;
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::CancelOrderCtxData;
use crate::services::lifecycle;

const NOT_CANCELLABLE: &str = "Order cannot be cancelled at this stage";

pub fn register_cancel_order_pipeline(orka_registry: &Orka<AppError>) {
  let mut p = Pipeline::<CancelOrderCtxData, AppError>::new(&[
    ("load_order_for_cancel", false, None),
    ("check_cancellable", false, None),
    ("cancel_and_restore_stock", false, None),
  ]);

  p.on_root("load_order_for_cancel", |ctx_data: ContextData<CancelOrderCtxData>| {
    Box::pin(async move {
      let (store, order_id, user_id) = {
        let guard = ctx_data.read();
        (guard.app_state.store.clone(), guard.order_id, guard.user_id)
      };
      let details = store
        .find_order_for_user(order_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
      ctx_data.write().current = Some(details.order);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("check_cancellable", |ctx_data: ContextData<CancelOrderCtxData>| {
    Box::pin(async move {
      let status = ctx_data.with(|data| data.current.as_ref().map(|order| order.status));
      match status {
        Some(status) if lifecycle::is_cancellable(status) => Ok(PipelineControl::Continue),
        Some(status) => {
          warn!(%status, "Cancellation refused.");
          Err(AppError::Conflict(NOT_CANCELLABLE.to_string()))
        }
        None => Err(AppError::NotFound("Order not found".to_string())),
      }
    })
  });

  p.on_root("cancel_and_restore_stock", cancel_and_restore_stock);

  orka_registry.register_pipeline(p);
}

/// The store re-checks the status under lock; a concurrent transition still yields a conflict.
#[instrument(name = "cancel_order::cancel_and_restore_stock", skip(ctx_data), err)]
async fn cancel_and_restore_stock(ctx_data: ContextData<CancelOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, order_id, user_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id, guard.user_id)
  };
  match store.cancel_order(order_id, user_id).await? {
    CancelOutcome::Cancelled(details) => {
      info!(%order_id, lines = details.items.len(), "Order cancelled.");
      ctx_data.write().cancelled = Some(details);
      Ok(PipelineControl::Continue)
    }
    CancelOutcome::NotCancellable(_) => Err(AppError::Conflict(NOT_CANCELLABLE.to_string())),
    CancelOutcome::NotFound => Err(AppError::NotFound("Order not found".to_string())),
  }
}
