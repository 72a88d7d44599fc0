// storefront/src/pipelines/payment_event_pipeline.rs

//! Applies a payment success or failure to an order.
//!
//! Shared by gateway webhooks and the client confirm-payment call. The transition and the
//! processed-event record commit together; confirmation emails run afterwards in an optional
//! step, so a mail failure is logged and never undoes or fails the committed transition.

use orka::{ContextData, Orka, Pipeline, PipelineControl};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::db::{PaymentUpdate, PaymentUpdateOutcome};
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{PaymentEventCtxData, PaymentSource};
use crate::services::notifications;

pub fn register_payment_event_pipeline(orka_registry: &Orka<AppError>) {
  let mut p = Pipeline::<PaymentEventCtxData, AppError>::new(&[
    ("load_order_for_payment", false, None),
    ("apply_payment_transition", false, None),
    (
      "send_confirmation_notifications",
      true,
      Some(Arc::new(|ctx: ContextData<PaymentEventCtxData>| !ctx.read().newly_paid())),
    ),
  ]);

  p.on_root("load_order_for_payment", load_order_for_payment);
  p.on_root("apply_payment_transition", apply_payment_transition);
  p.on_root("send_confirmation_notifications", send_confirmation_notifications);

  orka_registry.register_pipeline(p);
}

fn missing_order(source: &PaymentSource, detail: String) -> AppError {
  match source {
    PaymentSource::Client { .. } => AppError::NotFound("Order not found".to_string()),
    PaymentSource::Gateway { event_id, .. } => {
      AppError::UnresolvedPaymentEvent(format!("event {}: {}", event_id, detail))
    }
  }
}

#[instrument(name = "payment_event::load_order_for_payment", skip(ctx_data), err)]
async fn load_order_for_payment(ctx_data: ContextData<PaymentEventCtxData>) -> AppResult<PipelineControl> {
  let (store, order_id, source) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id, guard.source.clone())
  };
  let Some(order_id) = order_id else {
    return Err(missing_order(&source, "no orderId in payment metadata".to_string()));
  };

  let found = match &source {
    PaymentSource::Client { user_id } => store.find_order_for_user(order_id, *user_id).await?,
    PaymentSource::Gateway { .. } => store.find_order(order_id).await?,
  };
  match found {
    Some(details) => {
      info!(order_number = %details.order.order_number, status = %details.order.status, "Payment target resolved.");
      Ok(PipelineControl::Continue)
    }
    None => Err(missing_order(&source, format!("order {} does not exist", order_id))),
  }
}

#[instrument(name = "payment_event::apply_payment_transition", skip(ctx_data), err)]
async fn apply_payment_transition(ctx_data: ContextData<PaymentEventCtxData>) -> AppResult<PipelineControl> {
  let (store, update, source) = {
    let guard = ctx_data.read();
    let order_id = guard
      .order_id
      .ok_or_else(|| AppError::Internal("apply_payment_transition reached without an order id".to_string()))?;
    let (user_id, event_id, intent_id) = match &guard.source {
      PaymentSource::Client { user_id } => (Some(*user_id), None, None),
      PaymentSource::Gateway { event_id, intent_id } => (None, Some(event_id.clone()), Some(intent_id.clone())),
    };
    let update = PaymentUpdate {
      order_id,
      user_id,
      event_id,
      kind: guard.kind,
      intent_id,
    };
    (guard.app_state.store.clone(), update, guard.source.clone())
  };
  let kind = update.kind;
  let order_id = update.order_id;

  let outcome = store.apply_payment_update(update).await?;
  match (&outcome, &source) {
    (PaymentUpdateOutcome::Applied(order), _) => {
      info!(%order_id, status = %order.status, payment_status = %order.payment_status, "Payment transition applied.");
    }
    (PaymentUpdateOutcome::AlreadyPaid(_), _) => info!(%order_id, "Payment already recorded; nothing to do."),
    (PaymentUpdateOutcome::DuplicateEvent, _) => info!(%order_id, "Gateway event already processed."),
    (PaymentUpdateOutcome::Ignored(order), _) => {
      info!(%order_id, ?kind, status = %order.status, payment_status = %order.payment_status, "Payment event does not apply; ignored.");
    }
    (PaymentUpdateOutcome::Rejected(order), PaymentSource::Client { .. }) => {
      warn!(%order_id, status = %order.status, "Client payment confirmation refused.");
      return Err(AppError::Conflict("This order status cannot be updated.".to_string()));
    }
    (PaymentUpdateOutcome::Rejected(order), PaymentSource::Gateway { .. }) => {
      // Acknowledged so the gateway stops retrying; needs manual follow-up (refund).
      warn!(%order_id, status = %order.status, "Payment succeeded for an order that is no longer payable.");
    }
    (PaymentUpdateOutcome::NotFound, _) => {
      return Err(missing_order(&source, format!("order {} disappeared", order_id)));
    }
  }

  ctx_data.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_event::send_confirmation_notifications", skip(ctx_data), err)]
async fn send_confirmation_notifications(ctx_data: ContextData<PaymentEventCtxData>) -> AppResult<PipelineControl> {
  let (app_state, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.order_id)
  };
  let order_id =
    order_id.ok_or_else(|| AppError::Internal("notification step reached without an order id".to_string()))?;

  let details = app_state
    .store
    .find_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found for notification", order_id)))?;
  let user = app_state
    .store
    .find_user(details.order.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {} not found for notification", details.order.user_id)))?;

  notifications::dispatch_order_confirmation(app_state.mailer.as_ref(), &app_state.config, &details, &user).await?;
  ctx_data.write().notifications_sent = true;
  Ok(PipelineControl::Continue)
}
