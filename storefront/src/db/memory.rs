// storefront/src/db/memory.rs
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{
  CancelOutcome, FulfillmentUpdate, NewOrder, OrderFilter, OrderPage, OrderStore, PaymentUpdate, PaymentUpdateKind,
  PaymentUpdateOutcome, demand_by_product,
};
use crate::errors::{AppError, Result, StockIssue};
use crate::models::{Address, Cart, CartItem, Order, OrderDetails, OrderItem, OrderStatus, PaymentStatus, Product, User};
use crate::services::lifecycle::{self, Transition};

#[derive(Default)]
struct Tables {
  users: HashMap<Uuid, User>,
  addresses: HashMap<Uuid, Address>,
  products: HashMap<Uuid, Product>,
  carts: HashMap<Uuid, Cart>,
  orders: HashMap<Uuid, Order>,
  order_items: HashMap<Uuid, Vec<OrderItem>>,
  processed_events: HashSet<String>,
}

impl Tables {
  fn details(&self, order: &Order, with_address: bool) -> OrderDetails {
    let shipping_address = if with_address {
      order
        .shipping_address_id
        .and_then(|id| self.addresses.get(&id))
        .filter(|a| a.user_id == order.user_id)
        .cloned()
    } else {
      None
    };
    OrderDetails {
      order: order.clone(),
      items: self.order_items.get(&order.id).cloned().unwrap_or_default(),
      shipping_address,
    }
  }

  fn matches(&self, order: &Order, filter: &OrderFilter) -> bool {
    if filter.user_id.is_some_and(|user_id| user_id != order.user_id) {
      return false;
    }
    if filter.status.is_some_and(|status| status != order.status) {
      return false;
    }
    match filter.search.as_deref().map(str::to_lowercase) {
      Some(needle) => {
        let email = self.users.get(&order.user_id).map(|u| u.email.to_lowercase()).unwrap_or_default();
        order.order_number.to_lowercase().contains(&needle) || email.contains(&needle)
      }
      None => true,
    }
  }
}

/// Single-mutex store. Each trait method holds the lock for its whole body, which makes every
/// method atomic with respect to the others.
#[derive(Default)]
pub struct MemoryOrderStore {
  tables: Mutex<Tables>,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert_user(&self, email: &str, name: Option<&str>) -> User {
    let user = User {
      id: Uuid::new_v4(),
      email: email.to_string(),
      name: name.map(str::to_string),
      created_at: Utc::now(),
    };
    self.tables.lock().users.insert(user.id, user.clone());
    user
  }

  pub fn insert_address(&self, user_id: Uuid) -> Address {
    let address = Address {
      id: Uuid::new_v4(),
      user_id,
      full_name: "Test Customer".to_string(),
      line1: "1 Test Way".to_string(),
      line2: None,
      city: "Springfield".to_string(),
      state: "IL".to_string(),
      postal_code: "62701".to_string(),
      country: "US".to_string(),
    };
    self.tables.lock().addresses.insert(address.id, address.clone());
    address
  }

  pub fn insert_product(&self, name: &str, price_cents: i64, stock: i32) -> Product {
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      name: name.to_string(),
      description: None,
      price_cents,
      stock,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().products.insert(product.id, product.clone());
    product
  }

  pub fn set_product_price(&self, product_id: Uuid, price_cents: i64) {
    if let Some(product) = self.tables.lock().products.get_mut(&product_id) {
      product.price_cents = price_cents;
      product.updated_at = Utc::now();
    }
  }

  pub fn set_product_stock(&self, product_id: Uuid, stock: i32) {
    if let Some(product) = self.tables.lock().products.get_mut(&product_id) {
      product.stock = stock;
    }
  }

  pub fn product_stock(&self, product_id: Uuid) -> Option<i32> {
    self.tables.lock().products.get(&product_id).map(|p| p.stock)
  }

  /// Adds a line to the user's cart, creating the cart on first use.
  pub fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Uuid {
    let mut tables = self.tables.lock();
    let cart = tables.carts.entry(user_id).or_insert_with(|| Cart {
      id: Uuid::new_v4(),
      user_id,
      items: Vec::new(),
    });
    cart.items.push(CartItem {
      id: Uuid::new_v4(),
      cart_id: cart.id,
      product_id,
      quantity,
      size: None,
      color: None,
      added_at: Utc::now(),
    });
    cart.id
  }

  pub fn cart_len(&self, user_id: Uuid) -> usize {
    self.tables.lock().carts.get(&user_id).map_or(0, |c| c.items.len())
  }

  pub fn order_count(&self) -> usize {
    self.tables.lock().orders.len()
  }

  pub fn set_order_status(&self, order_id: Uuid, status: OrderStatus, payment_status: PaymentStatus) {
    if let Some(order) = self.tables.lock().orders.get_mut(&order_id) {
      order.status = status;
      order.payment_status = payment_status;
    }
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
    Ok(self.tables.lock().users.get(&user_id).cloned())
  }

  async fn find_address_for_user(&self, address_id: Uuid, user_id: Uuid) -> Result<Option<Address>> {
    let tables = self.tables.lock();
    Ok(tables.addresses.get(&address_id).filter(|a| a.user_id == user_id).cloned())
  }

  async fn load_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
    Ok(self.tables.lock().carts.get(&user_id).cloned())
  }

  async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
    let tables = self.tables.lock();
    let unique: HashSet<&Uuid> = ids.iter().collect();
    Ok(unique.into_iter().filter_map(|id| tables.products.get(id).cloned()).collect())
  }

  async fn insert_order(&self, new_order: NewOrder) -> Result<OrderDetails> {
    let mut tables = self.tables.lock();

    if tables.orders.values().any(|o| o.order_number == new_order.order_number) {
      return Err(AppError::OrderNumberCollision(new_order.order_number));
    }

    // Validate every decrement before touching anything.
    let mut remaining: HashMap<Uuid, i32> = HashMap::new();
    let mut issues = Vec::new();
    for demand in demand_by_product(&new_order.lines) {
      let product = tables
        .products
        .get(&demand.product_id)
        .ok_or_else(|| AppError::Validation(format!("Product not found: {}", demand.product_id)))?;
      if i64::from(product.stock) < demand.quantity {
        issues.push(StockIssue {
          product_name: demand.product_name,
          requested: demand.quantity,
          available: product.stock,
        });
      } else {
        // Fits in i32 because it is no larger than the current stock.
        remaining.insert(product.id, product.stock - demand.quantity as i32);
      }
    }
    if !issues.is_empty() {
      return Err(AppError::InsufficientStock(issues));
    }

    let now = Utc::now();
    for (product_id, stock) in remaining {
      if let Some(product) = tables.products.get_mut(&product_id) {
        product.stock = stock;
        product.updated_at = now;
      }
    }

    let totals = new_order.totals;
    let order = Order {
      id: Uuid::new_v4(),
      order_number: new_order.order_number,
      user_id: new_order.user_id,
      status: OrderStatus::Pending,
      payment_status: PaymentStatus::Pending,
      payment_method: new_order.payment_method,
      payment_intent_id: None,
      subtotal_cents: totals.subtotal_cents,
      tax_cents: totals.tax_cents,
      shipping_cents: totals.shipping_cents,
      discount_cents: totals.discount_cents,
      total_cents: totals.total_cents,
      shipping_address_id: new_order.shipping_address_id,
      tracking_number: None,
      estimated_delivery: None,
      notes: new_order.notes,
      created_at: now,
      updated_at: now,
    };
    let items: Vec<OrderItem> = new_order
      .lines
      .into_iter()
      .map(|line| OrderItem {
        id: Uuid::new_v4(),
        order_id: order.id,
        product_id: line.product_id,
        product_name: line.product_name,
        quantity: line.quantity,
        price_cents: line.price_cents,
        size: line.size,
        color: line.color,
      })
      .collect();

    if let Some(cart_id) = new_order.clear_cart_id {
      if let Some(cart) = tables.carts.values_mut().find(|c| c.id == cart_id) {
        cart.items.clear();
      }
    }

    tables.order_items.insert(order.id, items.clone());
    tables.orders.insert(order.id, order.clone());
    Ok(OrderDetails {
      order,
      items,
      shipping_address: None,
    })
  }

  async fn find_order_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<OrderDetails>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .orders
        .get(&order_id)
        .filter(|o| o.user_id == user_id)
        .map(|o| tables.details(o, true)),
    )
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<OrderDetails>> {
    let tables = self.tables.lock();
    Ok(tables.orders.get(&order_id).map(|o| tables.details(o, true)))
  }

  async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage> {
    let tables = self.tables.lock();
    let mut matching: Vec<&Order> = tables.orders.values().filter(|o| tables.matches(o, filter)).collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    let total = matching.len() as i64;
    let orders = matching
      .into_iter()
      .skip(filter.offset().max(0) as usize)
      .take(filter.limit.max(0) as usize)
      .map(|o| tables.details(o, false))
      .collect();
    Ok(OrderPage { orders, total })
  }

  async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
    let mut tables = self.tables.lock();
    let Some(current) = tables.orders.get(&order_id).filter(|o| o.user_id == user_id) else {
      return Ok(CancelOutcome::NotFound);
    };
    let Transition::Apply { status, payment_status } = lifecycle::on_cancel(current.status) else {
      return Ok(CancelOutcome::NotCancellable(current.status));
    };

    let restocks: Vec<(Uuid, i32)> = tables
      .order_items
      .get(&order_id)
      .map(|items| items.iter().map(|i| (i.product_id, i.quantity)).collect())
      .unwrap_or_default();
    let now = Utc::now();
    for (product_id, quantity) in restocks {
      if let Some(product) = tables.products.get_mut(&product_id) {
        product.stock += quantity;
        product.updated_at = now;
      }
    }

    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::Internal(format!("Order {} vanished during cancellation", order_id)))?;
    order.status = status;
    order.payment_status = payment_status;
    order.updated_at = now;
    let order = order.clone();
    Ok(CancelOutcome::Cancelled(tables.details(&order, true)))
  }

  async fn attach_payment_intent(&self, order_id: Uuid, user_id: Uuid, intent_id: &str) -> Result<bool> {
    let mut tables = self.tables.lock();
    match tables.orders.get_mut(&order_id).filter(|o| o.user_id == user_id) {
      Some(order) => {
        order.payment_intent_id.get_or_insert_with(|| intent_id.to_string());
        order.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn apply_payment_update(&self, update: PaymentUpdate) -> Result<PaymentUpdateOutcome> {
    let mut tables = self.tables.lock();
    let Some(current) = tables
      .orders
      .get(&update.order_id)
      .filter(|o| update.user_id.map_or(true, |user_id| o.user_id == user_id))
      .cloned()
    else {
      return Ok(PaymentUpdateOutcome::NotFound);
    };

    if let Some(event_id) = &update.event_id {
      if !tables.processed_events.insert(event_id.clone()) {
        return Ok(PaymentUpdateOutcome::DuplicateEvent);
      }
    }

    let transition = match update.kind {
      PaymentUpdateKind::Succeeded => lifecycle::on_payment_succeeded(current.status, current.payment_status),
      PaymentUpdateKind::Failed => lifecycle::on_payment_failed(current.status, current.payment_status),
    };
    Ok(match transition {
      Transition::Apply { status, payment_status } => {
        let order = tables
          .orders
          .get_mut(&update.order_id)
          .ok_or_else(|| AppError::Internal(format!("Order {} vanished during payment update", update.order_id)))?;
        order.status = status;
        order.payment_status = payment_status;
        if order.payment_intent_id.is_none() {
          order.payment_intent_id = update.intent_id;
        }
        order.updated_at = Utc::now();
        PaymentUpdateOutcome::Applied(order.clone())
      }
      Transition::AlreadyPaid => PaymentUpdateOutcome::AlreadyPaid(current),
      Transition::Ignored => PaymentUpdateOutcome::Ignored(current),
      Transition::Rejected => PaymentUpdateOutcome::Rejected(current),
    })
  }

  async fn update_fulfillment(&self, order_id: Uuid, update: FulfillmentUpdate) -> Result<Option<Order>> {
    let mut tables = self.tables.lock();
    let Some(order) = tables.orders.get_mut(&order_id) else {
      return Ok(None);
    };
    let (status, payment_status) = lifecycle::on_admin_status(update.status, order.payment_status);
    order.status = status;
    order.payment_status = payment_status;
    if update.tracking_number.is_some() {
      order.tracking_number = update.tracking_number;
    }
    if update.estimated_delivery.is_some() {
      order.estimated_delivery = update.estimated_delivery;
    }
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }
}
