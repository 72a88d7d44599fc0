// storefront/src/services/stripe.rs

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::payment_gateway::{PaymentGateway, PaymentIntent, PaymentIntentRequest};
use crate::errors::{AppError, Result};

#[derive(Debug, Deserialize)]
struct StripeIntentResponse {
  id: String,
  client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
  error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  message: Option<String>,
  #[serde(rename = "type")]
  kind: Option<String>,
}

/// Stripe PaymentIntents over the REST API.
pub struct StripeGateway {
  http: reqwest::Client,
  api_base: String,
  secret_key: String,
}

impl StripeGateway {
  pub fn new(api_base: &str, secret_key: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build Stripe HTTP client: {}", e)))?;
    Ok(Self {
      http,
      api_base: api_base.trim_end_matches('/').to_string(),
      secret_key: secret_key.to_string(),
    })
  }

  fn form_params(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut params = vec![
      ("amount".to_string(), request.amount_cents.to_string()),
      ("currency".to_string(), request.currency.clone()),
      ("description".to_string(), request.description.clone()),
      ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    params.extend(
      request
        .metadata
        .iter()
        .map(|(key, value)| (format!("metadata[{}]", key), value.clone())),
    );
    params
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  fn name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "stripe::create_payment_intent", skip(self, request), fields(amount = request.amount_cents, currency = %request.currency))]
  async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent> {
    let response = self
      .http
      .post(format!("{}/v1/payment_intents", self.api_base))
      .bearer_auth(&self.secret_key)
      .form(&Self::form_params(request))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let detail = match response.json::<StripeErrorEnvelope>().await {
        Ok(envelope) => format!(
          "{} ({})",
          envelope.error.message.unwrap_or_default(),
          envelope.error.kind.unwrap_or_default()
        ),
        Err(_) => "unreadable error body".to_string(),
      };
      warn!(http_status = %status, %detail, "Stripe rejected payment intent request.");
      return Err(AppError::Gateway(format!("Stripe returned {}: {}", status, detail)));
    }

    let body: StripeIntentResponse = response.json().await?;
    let client_secret = body
      .client_secret
      .ok_or_else(|| AppError::Gateway(format!("Stripe intent {} has no client secret", body.id)))?;
    info!(payment_intent_id = %body.id, "Stripe payment intent created.");
    Ok(PaymentIntent {
      id: body.id,
      client_secret,
    })
  }
}
