// storefront/src/db/mod.rs

//! Order and catalog persistence.
//!
//! Every method that writes more than one row is atomic: either all of its writes land or none
//! do. Guards on order state are re-checked at write time, so two concurrent requests cannot both
//! apply the same transition.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Address, Cart, Order, OrderDetails, OrderStatus, Product, User};
use crate::services::pricing::OrderTotals;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// One line of an order about to be created. `product_name` and `price_cents` are snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i32,
  pub price_cents: i64,
  pub size: Option<String>,
  pub color: Option<String>,
}

/// Total quantity asked of one product across all lines of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProductDemand {
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i64,
}

/// Groups lines by product, keeping first-seen order. Quantities are summed in i64.
pub(crate) fn demand_by_product(lines: &[NewOrderLine]) -> Vec<ProductDemand> {
  let mut demand: Vec<ProductDemand> = Vec::new();
  for line in lines {
    match demand.iter_mut().find(|d| d.product_id == line.product_id) {
      Some(existing) => existing.quantity += i64::from(line.quantity),
      None => demand.push(ProductDemand {
        product_id: line.product_id,
        product_name: line.product_name.clone(),
        quantity: i64::from(line.quantity),
      }),
    }
  }
  demand
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub order_number: String,
  pub user_id: Uuid,
  pub payment_method: String,
  pub shipping_address_id: Option<Uuid>,
  pub notes: Option<String>,
  pub totals: OrderTotals,
  pub lines: Vec<NewOrderLine>,
  /// Cart whose items are removed in the same transaction.
  pub clear_cart_id: Option<Uuid>,
}

/// Allow-listed order query. Only these fields can shape a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
  /// Owner scope. `None` only for administrative listings.
  pub user_id: Option<Uuid>,
  pub status: Option<OrderStatus>,
  /// Case-insensitive match on order number or customer email.
  pub search: Option<String>,
  pub page: i64,
  pub limit: i64,
}

impl OrderFilter {
  pub fn offset(&self) -> i64 {
    (self.page.max(1) - 1).saturating_mul(self.limit)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPage {
  pub orders: Vec<OrderDetails>,
  pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
  Cancelled(OrderDetails),
  NotCancellable(OrderStatus),
  NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentUpdateKind {
  Succeeded,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
  pub order_id: Uuid,
  /// Owner scope for client-initiated confirmation.
  pub user_id: Option<Uuid>,
  /// Gateway event id. Recorded once; a repeat delivery yields `DuplicateEvent`.
  pub event_id: Option<String>,
  pub kind: PaymentUpdateKind,
  /// Recorded on the order when it has none yet.
  pub intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentUpdateOutcome {
  Applied(Order),
  AlreadyPaid(Order),
  Ignored(Order),
  Rejected(Order),
  DuplicateEvent,
  NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentUpdate {
  pub status: OrderStatus,
  pub tracking_number: Option<String>,
  pub estimated_delivery: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;

  /// Only returns the address when it belongs to `user_id`.
  async fn find_address_for_user(&self, address_id: Uuid, user_id: Uuid) -> Result<Option<Address>>;

  async fn load_cart(&self, user_id: Uuid) -> Result<Option<Cart>>;

  /// Products that exist among `ids`, in no particular order.
  async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;

  /// Creates the order and its items, decrements stock and clears the cart in one unit.
  ///
  /// A line that no longer fits current stock fails the whole insert with
  /// `AppError::InsufficientStock`; a duplicate order number fails with
  /// `AppError::OrderNumberCollision`.
  async fn insert_order(&self, order: NewOrder) -> Result<OrderDetails>;

  async fn find_order_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<OrderDetails>>;

  async fn find_order(&self, order_id: Uuid) -> Result<Option<OrderDetails>>;

  async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage>;

  /// Cancels and restores the stock of every line, in one unit.
  async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<CancelOutcome>;

  /// Records the first intent opened for the order; later intents leave it unchanged.
  /// Returns `false` when no order matches `(order_id, user_id)`.
  async fn attach_payment_intent(&self, order_id: Uuid, user_id: Uuid, intent_id: &str) -> Result<bool>;

  async fn apply_payment_update(&self, update: PaymentUpdate) -> Result<PaymentUpdateOutcome>;

  async fn update_fulfillment(&self, order_id: Uuid, update: FulfillmentUpdate) -> Result<Option<Order>>;
}
