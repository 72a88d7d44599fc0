// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use orka::ContextData;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

use storefront::config::{AppConfig, PaymentProvider};
use storefront::errors::{AppError, Result as AppResult};
use storefront::models::{Address, OrderDetails, Product, User};
use storefront::pipelines::contexts::{CheckoutLine, OrderRequest, PaymentWebhookCtxData, PlaceOrderCtxData};
use storefront::db::MemoryOrderStore;
use storefront::services::gateway_events::{PAYMENT_FAILED, PAYMENT_SUCCEEDED};
use storefront::services::mailer::{Mailer, OutgoingEmail, SentEmailInfo};
use storefront::services::payment_mock::MockGateway;
use storefront::services::webhook_signature::sign_payload;
use storefront::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn test_config() -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: "postgres://unused".to_string(),
    app_base_url: "http://127.0.0.1:8080".to_string(),
    frontend_url: "https://shop.example.com".to_string(),
    payment_provider: PaymentProvider::Mock,
    stripe_secret_key: String::new(),
    stripe_api_base: "http://127.0.0.1:1".to_string(),
    webhook_secret: WEBHOOK_SECRET.to_string(),
    webhook_tolerance_secs: 300,
    currency: "usd".to_string(),
    minimum_charge_cents: 50,
    price_tolerance_cents: 1,
    email_sender: "noreply@example.com".to_string(),
    ops_inbox_email: "orders@example.com".to_string(),
    seed_db: false,
  }
}

/// Keeps every message handed to it; can be switched into a failing mode.
#[derive(Default)]
pub struct RecordingMailer {
  sent: Mutex<Vec<OutgoingEmail>>,
  failing: AtomicBool,
}

impl RecordingMailer {
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn sent(&self) -> Vec<OutgoingEmail> {
    self.sent.lock().clone()
  }

  pub fn count(&self) -> usize {
    self.sent.lock().len()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(&self, email: OutgoingEmail) -> AppResult<SentEmailInfo> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(AppError::Email("smtp relay unavailable".to_string()));
    }
    let info = SentEmailInfo::for_email(&email, format!("test_{}", Uuid::new_v4()));
    self.sent.lock().push(email);
    Ok(info)
  }
}

pub struct TestApp {
  pub store: Arc<MemoryOrderStore>,
  pub gateway: Arc<MockGateway>,
  pub mailer: Arc<RecordingMailer>,
  pub state: AppState,
}

impl TestApp {
  pub fn new() -> Self {
    setup_tracing();
    let store = Arc::new(MemoryOrderStore::new());
    let gateway = Arc::new(MockGateway::new());
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(store.clone(), gateway.clone(), mailer.clone(), test_config());
    Self {
      store,
      gateway,
      mailer,
      state,
    }
  }

  pub fn customer(&self) -> (User, Address) {
    let user = self.store.insert_user(&format!("{}@example.com", Uuid::new_v4().simple()), Some("Ada"));
    let address = self.store.insert_address(user.id);
    (user, address)
  }

  pub fn product(&self, name: &str, price_cents: i64, stock: i32) -> Product {
    self.store.insert_product(name, price_cents, stock)
  }

  pub async fn place(&self, user_id: Uuid, request: OrderRequest) -> AppResult<OrderDetails> {
    let ctx = ContextData::new(PlaceOrderCtxData::new(self.state.clone(), user_id, request));
    self.state.orka_instance.run(ctx.clone()).await?;
    let created = ctx.read().created_order.clone();
    created.ok_or_else(|| AppError::Internal("no order created".to_string()))
  }

  /// Fills the cart with `lines` and places a cart order.
  pub async fn place_from_cart(
    &self,
    user: &User,
    address: &Address,
    lines: &[(&Product, i32)],
    promo_code: Option<&str>,
  ) -> AppResult<OrderDetails> {
    for (product, qty) in lines {
      self.store.add_cart_item(user.id, product.id, *qty);
    }
    self
      .place(
        user.id,
        OrderRequest::FromCart {
          shipping_address_id: address.id,
          payment_method: "STRIPE".to_string(),
          notes: None,
          promo_code: promo_code.map(str::to_string),
        },
      )
      .await
  }

  pub async fn deliver_webhook(&self, body: &[u8], signature: Option<String>) -> AppResult<ContextData<PaymentWebhookCtxData>> {
    let ctx = ContextData::new(PaymentWebhookCtxData::new(
      self.state.clone(),
      body.to_vec(),
      signature,
      Utc::now().timestamp(),
    ));
    self.state.orka_instance.run(ctx.clone()).await?;
    Ok(ctx)
  }

  pub async fn deliver_signed(&self, body: &[u8]) -> AppResult<ContextData<PaymentWebhookCtxData>> {
    self.deliver_webhook(body, Some(sign(body))).await
  }
}

pub fn checkout_line(product: &Product, quantity: i32, price_cents: i64) -> CheckoutLine {
  CheckoutLine {
    product_id: product.id,
    quantity,
    price_cents,
    size: None,
    color: None,
  }
}

pub fn sign(body: &[u8]) -> String {
  sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), body).expect("test secret is valid")
}

fn intent_event_body(event_id: &str, event_type: &str, intent_id: &str, order_id: Option<Uuid>) -> Vec<u8> {
  let metadata = match order_id {
    Some(id) => json!({ "orderId": id.to_string() }),
    None => json!({}),
  };
  json!({
    "id": event_id,
    "type": event_type,
    "data": { "object": {
      "id": intent_id,
      "metadata": metadata,
      "last_payment_error": { "message": "card declined" },
    }},
  })
  .to_string()
  .into_bytes()
}

pub fn succeeded_event(event_id: &str, order_id: Option<Uuid>) -> Vec<u8> {
  intent_event_body(event_id, PAYMENT_SUCCEEDED, "pi_test_1", order_id)
}

pub fn failed_event(event_id: &str, order_id: Option<Uuid>) -> Vec<u8> {
  intent_event_body(event_id, PAYMENT_FAILED, "pi_test_1", order_id)
}
