// storefront/src/services/gateway_events.rs

use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{AppError, Result};

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Deserialize)]
struct RawEvent {
  id: String,
  #[serde(rename = "type")]
  event_type: String,
  data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
  object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawPaymentIntent {
  id: String,
  #[serde(default)]
  metadata: HashMap<String, String>,
  last_payment_error: Option<RawPaymentError>,
}

#[derive(Debug, Deserialize)]
struct RawPaymentError {
  message: Option<String>,
}

/// The payment-intent object carried by succeeded/failed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentEvent {
  pub event_id: String,
  pub intent_id: String,
  /// `None` when the metadata has no parseable `orderId`.
  pub order_id: Option<Uuid>,
  pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
  PaymentSucceeded(PaymentIntentEvent),
  PaymentFailed(PaymentIntentEvent),
  Other { event_id: String, event_type: String },
}

impl GatewayEvent {
  pub fn event_id(&self) -> &str {
    match self {
      GatewayEvent::PaymentSucceeded(e) | GatewayEvent::PaymentFailed(e) => &e.event_id,
      GatewayEvent::Other { event_id, .. } => event_id,
    }
  }

  pub fn event_type(&self) -> &str {
    match self {
      GatewayEvent::PaymentSucceeded(_) => PAYMENT_SUCCEEDED,
      GatewayEvent::PaymentFailed(_) => PAYMENT_FAILED,
      GatewayEvent::Other { event_type, .. } => event_type,
    }
  }

  /// Parses an already-verified body.
  pub fn parse(payload: &[u8]) -> Result<Self> {
    let raw: RawEvent =
      serde_json::from_slice(payload).map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

    match raw.event_type.as_str() {
      PAYMENT_SUCCEEDED => Ok(GatewayEvent::PaymentSucceeded(intent_event(raw.id, raw.data.object)?)),
      PAYMENT_FAILED => Ok(GatewayEvent::PaymentFailed(intent_event(raw.id, raw.data.object)?)),
      other => Ok(GatewayEvent::Other {
        event_id: raw.id,
        event_type: other.to_string(),
      }),
    }
  }
}

fn intent_event(event_id: String, object: serde_json::Value) -> Result<PaymentIntentEvent> {
  let intent: RawPaymentIntent = serde_json::from_value(object)
    .map_err(|e| AppError::Validation(format!("Malformed payment intent in webhook: {}", e)))?;
  Ok(PaymentIntentEvent {
    event_id,
    order_id: intent.metadata.get("orderId").and_then(|id| Uuid::parse_str(id).ok()),
    intent_id: intent.id,
    failure_message: intent.last_payment_error.and_then(|e| e.message),
  })
}
