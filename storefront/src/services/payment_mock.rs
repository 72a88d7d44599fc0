// storefront/src/services/payment_mock.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::payment_gateway::{PaymentGateway, PaymentIntent, PaymentIntentRequest};
use crate::errors::{AppError, Result as AppResult};

/// In-process gateway. Selected with `PAYMENT_PROVIDER=mock`; also drives the test suite.
#[derive(Debug, Default)]
pub struct MockGateway {
  requests: Mutex<Vec<PaymentIntentRequest>>,
  fail_next: AtomicBool,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// The next `create_payment_intent` call fails with a gateway error.
  pub fn fail_next_call(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }

  pub fn requests(&self) -> Vec<PaymentIntentRequest> {
    self.requests.lock().clone()
  }

  pub fn call_count(&self) -> usize {
    self.requests.lock().len()
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  #[instrument(name = "mock_gateway::create_payment_intent", skip(self, request), fields(amount = request.amount_cents, currency = %request.currency))]
  async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> AppResult<PaymentIntent> {
    self.requests.lock().push(request.clone());

    if self.fail_next.swap(false, Ordering::SeqCst) {
      warn!("Simulated gateway failure.");
      return Err(AppError::Gateway("Mock gateway unavailable".to_string()));
    }

    let intent_id = format!("mock_pi_{}", Uuid::new_v4().simple());
    info!(payment_intent_id = %intent_id, "Mock payment intent created.");
    Ok(PaymentIntent {
      client_secret: format!("{}_secret_{}", intent_id, Uuid::new_v4().simple()),
      id: intent_id,
    })
  }
}
