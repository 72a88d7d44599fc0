// storefront/src/pipelines/webhook_pipeline.rs

use orka::{ContextData, Orka, Pipeline, PipelineControl};
use tracing::{info, instrument, warn};

use crate::db::PaymentUpdateKind;
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{PaymentEventCtxData, PaymentSource, PaymentWebhookCtxData};
use crate::services::gateway_events::{GatewayEvent, PaymentIntentEvent};
use crate::services::webhook_signature;

pub fn register_webhook_pipeline(orka_registry: &Orka<AppError>) {
  let mut p = Pipeline::<PaymentWebhookCtxData, AppError>::new(&[
    ("verify_webhook_signature", false, None),
    ("parse_webhook_event", false, None),
    ("route_webhook_event", false, None),
    ("acknowledge_webhook_receipt", false, None),
  ]);

  // Runs before anything reads the body or touches state.
  p.on_root("verify_webhook_signature", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      let config = &guard.app_state.config;
      match webhook_signature::verify_signature(
        &guard.raw_payload,
        guard.signature_header.as_deref(),
        &config.webhook_secret,
        config.webhook_tolerance_secs,
        guard.received_at_unix,
      ) {
        Ok(()) => Ok(PipelineControl::Continue),
        Err(e) => {
          warn!(reason = %e, payload_bytes = guard.raw_payload.len(), "Webhook signature rejected.");
          Err(AppError::WebhookSignature(e.to_string()))
        }
      }
    })
  });

  p.on_root("parse_webhook_event", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let event = GatewayEvent::parse(&ctx_data.read().raw_payload)?;
      info!(event_id = %event.event_id(), event_type = %event.event_type(), "Webhook event verified.");
      ctx_data.write().event = Some(event);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("route_webhook_event", route_webhook_event);

  p.on_root("acknowledge_webhook_receipt", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      guard.acknowledged = true;
      if let Some(event) = &guard.event {
        info!(event_id = %event.event_id(), "Webhook receipt acknowledged.");
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  orka_registry.register_pipeline(p);
}

/// Payment events run the shared payment-event pipeline; every other type is acknowledged as is.
#[instrument(name = "webhook::route_webhook_event", skip(ctx_data), err)]
async fn route_webhook_event(ctx_data: ContextData<PaymentWebhookCtxData>) -> AppResult<PipelineControl> {
  let (app_state, event) = {
    let guard = ctx_data.read();
    let event = guard
      .event
      .clone()
      .ok_or_else(|| AppError::Internal("route_webhook_event reached without a parsed event".to_string()))?;
    (guard.app_state.clone(), event)
  };

  let (kind, intent_event): (PaymentUpdateKind, PaymentIntentEvent) = match event {
    GatewayEvent::PaymentSucceeded(intent_event) => (PaymentUpdateKind::Succeeded, intent_event),
    GatewayEvent::PaymentFailed(intent_event) => {
      if let Some(message) = &intent_event.failure_message {
        info!(payment_intent_id = %intent_event.intent_id, failure = %message, "Gateway reported a failed payment.");
      }
      (PaymentUpdateKind::Failed, intent_event)
    }
    GatewayEvent::Other { event_type, .. } => {
      info!(%event_type, "Unhandled webhook event type; acknowledging.");
      return Ok(PipelineControl::Continue);
    }
  };

  let payment_ctx = ContextData::new(PaymentEventCtxData::new(
    app_state.clone(),
    intent_event.order_id,
    kind,
    PaymentSource::Gateway {
      event_id: intent_event.event_id,
      intent_id: intent_event.intent_id,
    },
  ));
  app_state.orka_instance.run(payment_ctx.clone()).await?;

  let outcome = payment_ctx.read().outcome.clone();
  ctx_data.write().routed_outcome = outcome;
  Ok(PipelineControl::Continue)
}
