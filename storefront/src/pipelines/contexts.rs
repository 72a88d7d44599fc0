// storefront/src/pipelines/contexts.rs

//! Underlying data structs for the Orka pipelines.
//! Handlers receive these wrapped in `orka::ContextData`.

use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{NewOrderLine, PaymentUpdateKind, PaymentUpdateOutcome};
use crate::models::{Address, Order, OrderDetails, Product};
use crate::services::gateway_events::GatewayEvent;
use crate::services::payment_gateway::PaymentIntent;
use crate::services::pricing::OrderTotals;
use crate::state::AppState;

// --- Order placement ---

/// One item of a direct checkout, with the price the client displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
  pub product_id: Uuid,
  pub quantity: i32,
  pub price_cents: i64,
  pub size: Option<String>,
  pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRequest {
  /// Priced from the catalog; promo codes apply.
  FromCart {
    shipping_address_id: Uuid,
    payment_method: String,
    notes: Option<String>,
    promo_code: Option<String>,
  },
  /// Client-priced; prices are checked against the catalog within tolerance.
  Checkout {
    items: Vec<CheckoutLine>,
    shipping_cents: i64,
    total_cents: i64,
  },
}

/// A requested line before pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
  pub product_id: Uuid,
  pub quantity: i32,
  pub client_price_cents: Option<i64>,
  pub size: Option<String>,
  pub color: Option<String>,
}

#[derive(Clone)]
pub struct PlaceOrderCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub request: OrderRequest,
  pub draft_lines: Vec<DraftLine>,
  pub catalog: HashMap<Uuid, Product>,
  pub shipping_address: Option<Address>,
  pub clear_cart_id: Option<Uuid>,
  pub priced_lines: Vec<NewOrderLine>,
  pub totals: Option<OrderTotals>,
  pub created_order: Option<OrderDetails>,
}

impl PlaceOrderCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, request: OrderRequest) -> Self {
    Self {
      app_state,
      user_id,
      request,
      draft_lines: Vec::new(),
      catalog: HashMap::new(),
      shipping_address: None,
      clear_cart_id: None,
      priced_lines: Vec::new(),
      totals: None,
      created_order: None,
    }
  }

  pub fn is_cart_order(&self) -> bool {
    matches!(self.request, OrderRequest::FromCart { .. })
  }
}

// --- Cancellation ---

#[derive(Clone)]
pub struct CancelOrderCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub current: Option<Order>,
  pub cancelled: Option<OrderDetails>,
}

impl CancelOrderCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid) -> Self {
    Self {
      app_state,
      user_id,
      order_id,
      current: None,
      cancelled: None,
    }
  }
}

// --- Payment intent ---

#[derive(Clone)]
pub struct PaymentIntentCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub order: Option<Order>,
  pub intent: Option<PaymentIntent>,
}

impl PaymentIntentCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid) -> Self {
    Self {
      app_state,
      user_id,
      order_id,
      order: None,
      intent: None,
    }
  }
}

// --- Payment events (gateway and client confirmation) ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSource {
  Gateway { event_id: String, intent_id: String },
  /// Client-initiated confirmation, scoped to the owner.
  Client { user_id: Uuid },
}

#[derive(Clone)]
pub struct PaymentEventCtxData {
  pub app_state: AppState,
  /// `None` when a gateway event carried no usable order id.
  pub order_id: Option<Uuid>,
  pub kind: PaymentUpdateKind,
  pub source: PaymentSource,
  pub outcome: Option<PaymentUpdateOutcome>,
  pub notifications_sent: bool,
}

impl PaymentEventCtxData {
  pub fn new(app_state: AppState, order_id: Option<Uuid>, kind: PaymentUpdateKind, source: PaymentSource) -> Self {
    Self {
      app_state,
      order_id,
      kind,
      source,
      outcome: None,
      notifications_sent: false,
    }
  }

  /// True only when this run moved the order into PAID.
  pub fn newly_paid(&self) -> bool {
    self.kind == PaymentUpdateKind::Succeeded && matches!(self.outcome, Some(PaymentUpdateOutcome::Applied(_)))
  }
}

// --- Webhook delivery ---

#[derive(Clone)]
pub struct PaymentWebhookCtxData {
  pub app_state: AppState,
  pub raw_payload: Vec<u8>,
  pub signature_header: Option<String>,
  pub received_at_unix: i64,
  pub event: Option<GatewayEvent>,
  pub routed_outcome: Option<PaymentUpdateOutcome>,
  pub acknowledged: bool,
}

impl PaymentWebhookCtxData {
  pub fn new(app_state: AppState, raw_payload: Vec<u8>, signature_header: Option<String>, received_at_unix: i64) -> Self {
    Self {
      app_state,
      raw_payload,
      signature_header,
      received_at_unix,
      event: None,
      routed_outcome: None,
      acknowledged: false,
    }
  }
}
