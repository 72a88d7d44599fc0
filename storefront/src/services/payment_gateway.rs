// storefront/src/services/payment_gateway.rs

use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::Result;

/// Parameters for opening a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
  pub amount_cents: i64,
  pub currency: String,
  pub description: String,
  /// Echoed back on gateway events so they can be mapped to an order.
  pub metadata: BTreeMap<String, String>,
}

impl PaymentIntentRequest {
  pub fn for_order(order_id: Uuid, order_number: &str, user_id: Uuid, amount_cents: i64, currency: &str) -> Self {
    let metadata = BTreeMap::from([
      ("orderId".to_string(), order_id.to_string()),
      ("orderNumber".to_string(), order_number.to_string()),
      ("userId".to_string(), user_id.to_string()),
    ]);
    Self {
      amount_cents,
      currency: currency.to_string(),
      description: format!("Order {}", order_number),
      metadata,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
  pub id: String,
  pub client_secret: String,
}

/// Outbound side of the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  /// Transport failures and rejections surface as `AppError::Gateway`.
  async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent>;
}
