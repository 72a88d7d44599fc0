// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use orka::ContextData;
use serde_json::json;
use tracing::{info, instrument};

use super::run_pipeline;
use crate::errors::AppError;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Gateway callback. The body is taken raw because the signature covers the exact bytes.
#[instrument(name = "handler::payment_webhook", skip(app_state, req, body), fields(payload_bytes = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature_header = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(String::from);

  let ctx = ContextData::new(PaymentWebhookCtxData::new(
    app_state.get_ref().clone(),
    body.to_vec(),
    signature_header,
    Utc::now().timestamp(),
  ));
  run_pipeline(app_state.get_ref(), &ctx, "payment_webhook").await?;

  let guard = ctx.read();
  info!(acknowledged = guard.acknowledged, outcome = ?guard.routed_outcome.as_ref().map(outcome_label), "Webhook processed.");
  Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

fn outcome_label(outcome: &crate::db::PaymentUpdateOutcome) -> &'static str {
  use crate::db::PaymentUpdateOutcome::*;
  match outcome {
    Applied(_) => "applied",
    AlreadyPaid(_) => "already_paid",
    Ignored(_) => "ignored",
    Rejected(_) => "rejected",
    DuplicateEvent => "duplicate_event",
    NotFound => "not_found",
  }
}
