// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use orka::ContextData;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::run_pipeline;
use super::views::OrderView;
use crate::db::{PaymentUpdateKind, PaymentUpdateOutcome};
use crate::errors::AppError;
use crate::pipelines::contexts::{PaymentEventCtxData, PaymentIntentCtxData, PaymentSource};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentPayload {
  pub order_id: Uuid,
}

#[instrument(
  name = "handler::create_payment_intent",
  skip(app_state, auth_user, payload),
  fields(user_id = %auth_user.user_id, order_id = %payload.order_id)
)]
pub async fn create_payment_intent_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<PaymentIntentPayload>,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(PaymentIntentCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    payload.order_id,
  ));
  run_pipeline(app_state.get_ref(), &ctx, "create_payment_intent").await?;

  let intent = ctx
    .read()
    .intent
    .clone()
    .ok_or_else(|| AppError::Internal("Payment intent pipeline completed without an intent".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({
    "clientSecret": intent.client_secret,
    "paymentIntentId": intent.id,
  })))
}

/// Client-side confirmation after the payment form succeeded. Shares the gateway event path,
/// so confirmation emails go out only if this call is the one that marks the order paid.
#[instrument(name = "handler::confirm_payment", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn confirm_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let ctx = ContextData::new(PaymentEventCtxData::new(
    app_state.get_ref().clone(),
    Some(order_id),
    PaymentUpdateKind::Succeeded,
    PaymentSource::Client {
      user_id: auth_user.user_id,
    },
  ));
  run_pipeline(app_state.get_ref(), &ctx, "confirm_payment").await?;

  let outcome = ctx.read().outcome.clone();
  let (message, order) = match outcome {
    Some(PaymentUpdateOutcome::Applied(order)) => ("Payment confirmed successfully", order),
    Some(PaymentUpdateOutcome::AlreadyPaid(order)) => ("Payment already confirmed", order),
    Some(PaymentUpdateOutcome::Ignored(_)) | Some(PaymentUpdateOutcome::Rejected(_)) => {
      return Err(AppError::Conflict("This order status cannot be updated.".to_string()))
    }
    Some(PaymentUpdateOutcome::NotFound) | Some(PaymentUpdateOutcome::DuplicateEvent) | None => {
      return Err(AppError::NotFound("Order not found".to_string()))
    }
  };
  info!(%order_id, status = %order.status, result = message, "Client payment confirmation handled.");
  Ok(HttpResponse::Ok().json(json!({ "message": message, "order": OrderView::from(&order) })))
}
