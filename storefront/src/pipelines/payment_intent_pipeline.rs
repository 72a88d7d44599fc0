// storefront/src/pipelines/payment_intent_pipeline.rs

//! Opens a gateway payment intent for an order owned by the caller.
//!
//! The intent id is written only after the gateway answers, so a gateway failure leaves the
//! order untouched.

use orka::{ContextData, Orka, Pipeline, PipelineControl};
use tracing::{info, instrument, warn};

use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderStatus, PaymentStatus};
use crate::pipelines::contexts::PaymentIntentCtxData;
use crate::services::payment_gateway::PaymentIntentRequest;
use crate::services::pricing::format_major;

pub fn register_payment_intent_pipeline(orka_registry: &Orka<AppError>) {
  let mut p = Pipeline::<PaymentIntentCtxData, AppError>::new(&[
    ("load_order_for_intent", false, None),
    ("validate_chargeable_amount", false, None),
    ("open_gateway_intent", false, None),
    ("persist_intent_id", false, None),
  ]);

  p.on_root("load_order_for_intent", load_order_for_intent);
  p.on_root("validate_chargeable_amount", validate_chargeable_amount);
  p.on_root("open_gateway_intent", open_gateway_intent);
  p.on_root("persist_intent_id", persist_intent_id);

  orka_registry.register_pipeline(p);
}

async fn load_order_for_intent(ctx_data: ContextData<PaymentIntentCtxData>) -> AppResult<PipelineControl> {
  let (store, order_id, user_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id, guard.user_id)
  };
  // Owner-scoped lookup: another user's order is indistinguishable from a missing one.
  let details = store
    .find_order_for_user(order_id, user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  ctx_data.write().order = Some(details.order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_intent::validate_chargeable_amount", skip(ctx_data), err)]
async fn validate_chargeable_amount(ctx_data: ContextData<PaymentIntentCtxData>) -> AppResult<PipelineControl> {
  let guard = ctx_data.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("validate_chargeable_amount reached without an order".to_string()))?;
  let config = &guard.app_state.config;

  if order.total_cents <= 0 {
    return Err(AppError::Validation("Invalid order amount".to_string()));
  }
  if order.total_cents < config.minimum_charge_cents {
    return Err(AppError::Validation(format!(
      "Order amount {} is below the minimum chargeable amount of {} {}",
      format_major(order.total_cents),
      format_major(config.minimum_charge_cents),
      config.currency.to_uppercase()
    )));
  }
  if order.payment_status == PaymentStatus::Paid {
    return Err(AppError::Conflict("Order already paid".to_string()));
  }
  if order.status != OrderStatus::Pending {
    warn!(status = %order.status, "Payment intent requested for an order that is not awaiting payment.");
    return Err(AppError::Conflict("Order is not awaiting payment".to_string()));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_intent::open_gateway_intent", skip(ctx_data), err)]
async fn open_gateway_intent(ctx_data: ContextData<PaymentIntentCtxData>) -> AppResult<PipelineControl> {
  let (gateway, request) = {
    let guard = ctx_data.read();
    let order = guard
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("open_gateway_intent reached without an order".to_string()))?;
    let request = PaymentIntentRequest::for_order(
      order.id,
      &order.order_number,
      order.user_id,
      order.total_cents,
      &guard.app_state.config.currency,
    );
    (guard.app_state.gateway.clone(), request)
  };

  let intent = gateway.create_payment_intent(&request).await?;
  info!(gateway = gateway.name(), payment_intent_id = %intent.id, "Payment intent opened.");
  ctx_data.write().intent = Some(intent);
  Ok(PipelineControl::Continue)
}

async fn persist_intent_id(ctx_data: ContextData<PaymentIntentCtxData>) -> AppResult<PipelineControl> {
  let (store, order_id, user_id, intent_id) = {
    let guard = ctx_data.read();
    let intent_id = guard
      .intent
      .as_ref()
      .map(|intent| intent.id.clone())
      .ok_or_else(|| AppError::Internal("persist_intent_id reached without an intent".to_string()))?;
    (guard.app_state.store.clone(), guard.order_id, guard.user_id, intent_id)
  };
  if store.attach_payment_intent(order_id, user_id, &intent_id).await? {
    Ok(PipelineControl::Continue)
  } else {
    Err(AppError::NotFound("Order not found".to_string()))
  }
}
