// storefront/src/db/postgres.rs
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
  CancelOutcome, FulfillmentUpdate, NewOrder, OrderFilter, OrderPage, OrderStore, PaymentUpdate, PaymentUpdateKind,
  PaymentUpdateOutcome, demand_by_product,
};
use crate::errors::{AppError, Result, StockIssue};
use crate::models::{Address, Cart, CartItem, Order, OrderDetails, OrderItem, OrderStatus, PaymentStatus, Product, User};
use crate::services::lifecycle::{self, Transition};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.status, o.payment_status, o.payment_method, \
  o.payment_intent_id, o.subtotal_cents, o.tax_cents, o.shipping_cents, o.discount_cents, o.total_cents, \
  o.shipping_address_id, o.tracking_number, o.estimated_delivery, o.notes, o.created_at, o.updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, price_cents, size, color";

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Config(format!("Database migration failed: {}", e)))?;
    info!("Database migrations applied.");
    Ok(())
  }

  async fn lock_order(
    tx: &mut Transaction<'static, Postgres>,
    order_id: Uuid,
    user_id: Option<Uuid>,
  ) -> Result<Option<Order>> {
    let sql = format!(
      "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 AND ($2::uuid IS NULL OR o.user_id = $2) FOR UPDATE"
    );
    let order = sqlx::query_as::<_, Order>(&sql)
      .bind(order_id)
      .bind(user_id)
      .fetch_optional(&mut **tx)
      .await?;
    Ok(order)
  }

  async fn items_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
    if order_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, line_no");
    let items = sqlx::query_as::<_, OrderItem>(&sql)
      .bind(order_ids.to_vec())
      .fetch_all(&self.pool)
      .await?;
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
      grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
  }

  async fn details(&self, order: Order, with_address: bool) -> Result<OrderDetails> {
    let items = self.items_for(&[order.id]).await?.remove(&order.id).unwrap_or_default();
    let shipping_address = match (with_address, order.shipping_address_id) {
      (true, Some(address_id)) => self.find_address_for_user(address_id, order.user_id).await?,
      _ => None,
    };
    Ok(OrderDetails {
      order,
      items,
      shipping_address,
    })
  }

  async fn fetch_order(&self, order_id: Uuid, user_id: Option<Uuid>) -> Result<Option<OrderDetails>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 AND ($2::uuid IS NULL OR o.user_id = $2)");
    let order = sqlx::query_as::<_, Order>(&sql)
      .bind(order_id)
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    match order {
      Some(order) => Ok(Some(self.details(order, true).await?)),
      None => Ok(None),
    }
  }
}

fn is_order_number_collision(err: &sqlx::Error) -> bool {
  match err {
    sqlx::Error::Database(db_err) => {
      db_err.is_unique_violation() && db_err.constraint().map_or(true, |c| c == ORDER_NUMBER_CONSTRAINT)
    }
    _ => false,
  }
}

/// `%` and `_` in user input match literally.
fn like_pattern(search: &str) -> String {
  let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
  format!("%{}%", escaped)
}

#[async_trait]
impl OrderStore for PgOrderStore {
  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT id, email, name, created_at FROM users WHERE id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  async fn find_address_for_user(&self, address_id: Uuid, user_id: Uuid) -> Result<Option<Address>> {
    let address = sqlx::query_as::<_, Address>(
      "SELECT id, user_id, full_name, line1, line2, city, state, postal_code, country \
       FROM addresses WHERE id = $1 AND user_id = $2",
    )
    .bind(address_id)
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(address)
  }

  async fn load_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
    let cart_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    let Some(cart_id) = cart_id else {
      return Ok(None);
    };
    let items = sqlx::query_as::<_, CartItem>(
      "SELECT id, cart_id, product_id, quantity, size, color, added_at \
       FROM cart_items WHERE cart_id = $1 ORDER BY added_at, id",
    )
    .bind(cart_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(Some(Cart {
      id: cart_id,
      user_id,
      items,
    }))
  }

  async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
      "SELECT id, name, description, price_cents, stock, created_at, updated_at FROM products WHERE id = ANY($1)",
    )
    .bind(ids.to_vec())
    .fetch_all(&self.pool)
    .await?;
    Ok(products)
  }

  #[instrument(name = "pg::insert_order", skip(self, new_order), fields(order_number = %new_order.order_number, lines = new_order.lines.len()))]
  async fn insert_order(&self, new_order: NewOrder) -> Result<OrderDetails> {
    let mut tx = self.pool.begin().await?;
    let totals = new_order.totals;

    let insert_sql = format!(
      "INSERT INTO orders AS o (id, order_number, user_id, status, payment_status, payment_method, subtotal_cents, \
       tax_cents, shipping_cents, discount_cents, total_cents, shipping_address_id, notes) \
       VALUES ($1, $2, $3, 'PENDING', 'PENDING', $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {ORDER_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Order>(&insert_sql)
      .bind(Uuid::new_v4())
      .bind(&new_order.order_number)
      .bind(new_order.user_id)
      .bind(&new_order.payment_method)
      .bind(totals.subtotal_cents)
      .bind(totals.tax_cents)
      .bind(totals.shipping_cents)
      .bind(totals.discount_cents)
      .bind(totals.total_cents)
      .bind(new_order.shipping_address_id)
      .bind(&new_order.notes)
      .fetch_one(&mut *tx)
      .await;
    let order = match inserted {
      Ok(order) => order,
      Err(e) if is_order_number_collision(&e) => {
        warn!("Order number already taken.");
        return Err(AppError::OrderNumberCollision(new_order.order_number));
      }
      Err(e) => return Err(e.into()),
    };

    let item_sql = format!(
      "INSERT INTO order_items (id, order_id, line_no, product_id, product_name, quantity, price_cents, size, color) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ITEM_COLUMNS}"
    );
    // Every short product is collected; the transaction rolls back on the error return.
    let mut issues = Vec::new();
    for demand in demand_by_product(&new_order.lines) {
      let decremented = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1 AND stock >= $2",
      )
      .bind(demand.product_id)
      .bind(demand.quantity)
      .execute(&mut *tx)
      .await?;
      if decremented.rows_affected() == 0 {
        let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
          .bind(demand.product_id)
          .fetch_optional(&mut *tx)
          .await?;
        issues.push(StockIssue {
          product_name: demand.product_name,
          requested: demand.quantity,
          available: available.unwrap_or(0),
        });
      }
    }
    if !issues.is_empty() {
      warn!(short_products = issues.len(), "Stock changed before commit.");
      return Err(AppError::InsufficientStock(issues));
    }

    let mut items = Vec::with_capacity(new_order.lines.len());
    for (line_no, line) in new_order.lines.iter().enumerate() {
      let item = sqlx::query_as::<_, OrderItem>(&item_sql)
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(line.quantity)
        .bind(line.price_cents)
        .bind(&line.size)
        .bind(&line.color)
        .fetch_one(&mut *tx)
        .await?;
      items.push(item);
    }

    if let Some(cart_id) = new_order.clear_cart_id {
      sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(order_id = %order.id, total_cents = order.total_cents, "Order committed.");
    Ok(OrderDetails {
      order,
      items,
      shipping_address: None,
    })
  }

  async fn find_order_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<OrderDetails>> {
    self.fetch_order(order_id, Some(user_id)).await
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<OrderDetails>> {
    self.fetch_order(order_id, None).await
  }

  async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage> {
    const WHERE: &str = "WHERE ($1::uuid IS NULL OR o.user_id = $1) \
      AND ($2::order_status IS NULL OR o.status = $2) \
      AND ($3::text IS NULL OR o.order_number ILIKE $3 OR u.email ILIKE $3)";
    let pattern = filter.search.as_deref().map(like_pattern);

    let total: i64 = sqlx::query_scalar(&format!(
      "SELECT COUNT(*) FROM orders o JOIN users u ON u.id = o.user_id {WHERE}"
    ))
    .bind(filter.user_id)
    .bind(filter.status)
    .bind(&pattern)
    .fetch_one(&self.pool)
    .await?;

    let orders = sqlx::query_as::<_, Order>(&format!(
      "SELECT {ORDER_COLUMNS} FROM orders o JOIN users u ON u.id = o.user_id {WHERE} \
       ORDER BY o.created_at DESC, o.id LIMIT $4 OFFSET $5"
    ))
    .bind(filter.user_id)
    .bind(filter.status)
    .bind(&pattern)
    .bind(filter.limit)
    .bind(filter.offset())
    .fetch_all(&self.pool)
    .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = self.items_for(&ids).await?;
    let orders = orders
      .into_iter()
      .map(|order| OrderDetails {
        items: items.remove(&order.id).unwrap_or_default(),
        order,
        shipping_address: None,
      })
      .collect();
    Ok(OrderPage { orders, total })
  }

  #[instrument(name = "pg::cancel_order", skip(self))]
  async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
    let mut tx = self.pool.begin().await?;
    let Some(current) = Self::lock_order(&mut tx, order_id, Some(user_id)).await? else {
      return Ok(CancelOutcome::NotFound);
    };
    let Transition::Apply { status, payment_status } = lifecycle::on_cancel(current.status) else {
      return Ok(CancelOutcome::NotCancellable(current.status));
    };

    let cancelled = sqlx::query(
      "UPDATE orders SET status = $2, payment_status = $3, updated_at = now() \
       WHERE id = $1 AND status IN ('PENDING', 'CONFIRMED')",
    )
    .bind(order_id)
    .bind(status)
    .bind(payment_status)
    .execute(&mut *tx)
    .await?;
    if cancelled.rows_affected() != 1 {
      return Ok(CancelOutcome::NotCancellable(current.status));
    }

    let restored = sqlx::query(
      "UPDATE products p SET stock = p.stock + s.qty, updated_at = now() \
       FROM (SELECT product_id, SUM(quantity)::int AS qty FROM order_items WHERE order_id = $1 GROUP BY product_id) s \
       WHERE p.id = s.product_id",
    )
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(products_restored = restored.rows_affected(), "Order cancelled and stock restored.");

    match self.fetch_order(order_id, Some(user_id)).await? {
      Some(details) => Ok(CancelOutcome::Cancelled(details)),
      None => Err(AppError::Internal(format!("Order {} vanished after cancellation", order_id))),
    }
  }

  async fn attach_payment_intent(&self, order_id: Uuid, user_id: Uuid, intent_id: &str) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_intent_id = COALESCE(payment_intent_id, $3), updated_at = now() \
       WHERE id = $1 AND user_id = $2",
    )
    .bind(order_id)
    .bind(user_id)
    .bind(intent_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(name = "pg::apply_payment_update", skip(self, update), fields(order_id = %update.order_id, kind = ?update.kind))]
  async fn apply_payment_update(&self, update: PaymentUpdate) -> Result<PaymentUpdateOutcome> {
    let mut tx = self.pool.begin().await?;
    let Some(current) = Self::lock_order(&mut tx, update.order_id, update.user_id).await? else {
      return Ok(PaymentUpdateOutcome::NotFound);
    };

    if let Some(event_id) = &update.event_id {
      let recorded = sqlx::query(
        "INSERT INTO processed_payment_events (event_id, order_id) VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING",
      )
      .bind(event_id)
      .bind(current.id)
      .execute(&mut *tx)
      .await?;
      if recorded.rows_affected() == 0 {
        return Ok(PaymentUpdateOutcome::DuplicateEvent);
      }
    }

    let transition = match update.kind {
      PaymentUpdateKind::Succeeded => lifecycle::on_payment_succeeded(current.status, current.payment_status),
      PaymentUpdateKind::Failed => lifecycle::on_payment_failed(current.status, current.payment_status),
    };
    let outcome = match transition {
      Transition::Apply { status, payment_status } => {
        let sql = format!(
          "UPDATE orders AS o SET status = $2, payment_status = $3, \
           payment_intent_id = COALESCE(o.payment_intent_id, $4), updated_at = now() \
           WHERE o.id = $1 AND o.status = $5 AND o.payment_status = $6 RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
          .bind(current.id)
          .bind(status)
          .bind(payment_status)
          .bind(&update.intent_id)
          .bind(current.status)
          .bind(current.payment_status)
          .fetch_optional(&mut *tx)
          .await?
          .ok_or_else(|| AppError::Internal(format!("Order {} changed under lock", current.id)))?;
        PaymentUpdateOutcome::Applied(updated)
      }
      Transition::AlreadyPaid => PaymentUpdateOutcome::AlreadyPaid(current),
      Transition::Ignored => PaymentUpdateOutcome::Ignored(current),
      Transition::Rejected => PaymentUpdateOutcome::Rejected(current),
    };

    tx.commit().await?;
    Ok(outcome)
  }

  #[instrument(name = "pg::update_fulfillment", skip(self, update), fields(status = %update.status))]
  async fn update_fulfillment(&self, order_id: Uuid, update: FulfillmentUpdate) -> Result<Option<Order>> {
    let mut tx = self.pool.begin().await?;
    let Some(current) = Self::lock_order(&mut tx, order_id, None).await? else {
      return Ok(None);
    };
    let (status, payment_status): (OrderStatus, PaymentStatus) =
      lifecycle::on_admin_status(update.status, current.payment_status);

    let sql = format!(
      "UPDATE orders AS o SET status = $2, payment_status = $3, \
       tracking_number = COALESCE($4, o.tracking_number), \
       estimated_delivery = COALESCE($5, o.estimated_delivery), updated_at = now() \
       WHERE o.id = $1 RETURNING {ORDER_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Order>(&sql)
      .bind(order_id)
      .bind(status)
      .bind(payment_status)
      .bind(&update.tracking_number)
      .bind(update.estimated_delivery)
      .fetch_one(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(Some(updated))
  }
}

/// Demo catalog for local development. Idempotent.
pub async fn seed_demo_catalog(pool: &PgPool) -> Result<()> {
  let user_id = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
  let address_id = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);
  let cart_id = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0003);
  let products = [
    (0x0000_0000_0000_4000_8000_0000_0000_0101_u128, "Classic Tee", 25_00_i64, 100_i32),
    (0x0000_0000_0000_4000_8000_0000_0000_0102_u128, "Denim Jacket", 89_00, 25),
    (0x0000_0000_0000_4000_8000_0000_0000_0103_u128, "Canvas Tote", 15_00, 60),
  ];

  let mut tx = pool.begin().await?;
  sqlx::query("INSERT INTO users (id, email, name) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
    .bind(user_id)
    .bind("john.doe@example.com")
    .bind("John Doe")
    .execute(&mut *tx)
    .await?;
  sqlx::query(
    "INSERT INTO addresses (id, user_id, full_name, line1, city, state, postal_code, country) \
     VALUES ($1, $2, 'John Doe', '123 Main St', 'Springfield', 'IL', '62701', 'US') ON CONFLICT DO NOTHING",
  )
  .bind(address_id)
  .bind(user_id)
  .execute(&mut *tx)
  .await?;
  for (id, name, price_cents, stock) in products {
    sqlx::query("INSERT INTO products (id, name, price_cents, stock) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING")
      .bind(Uuid::from_u128(id))
      .bind(name)
      .bind(price_cents)
      .bind(stock)
      .execute(&mut *tx)
      .await?;
  }
  sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
    .bind(cart_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
  tx.commit().await?;
  info!(%user_id, %address_id, "Demo catalog seeded.");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::NewOrderLine;
  use crate::services::pricing::quote_cart;

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("ORD-1"), "%ORD-1%");
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
  }

  // The tests below need a Postgres server: DATABASE_URL=... cargo test -- --ignored

  async fn insert_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
      .bind(id)
      .bind(format!("{}@example.com", id.simple()))
      .execute(pool)
      .await
      .unwrap();
    id
  }

  async fn insert_product(pool: &PgPool, name: &str, price_cents: i64, stock: i32) -> NewOrderLine {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, price_cents, stock) VALUES ($1, $2, $3, $4)")
      .bind(id)
      .bind(name)
      .bind(price_cents)
      .bind(stock)
      .execute(pool)
      .await
      .unwrap();
    NewOrderLine {
      product_id: id,
      product_name: name.to_string(),
      quantity: 1,
      price_cents,
      size: None,
      color: None,
    }
  }

  fn new_order(user_id: Uuid, lines: Vec<NewOrderLine>) -> NewOrder {
    let subtotal = lines.iter().map(|l| l.price_cents * i64::from(l.quantity)).sum();
    NewOrder {
      order_number: format!("ORD-TEST-{}", Uuid::new_v4().simple()),
      user_id,
      payment_method: "STRIPE".to_string(),
      shipping_address_id: None,
      notes: None,
      totals: quote_cart(subtotal, None),
      lines,
      clear_cart_id: None,
    }
  }

  fn with_quantity(line: &NewOrderLine, quantity: i32) -> NewOrderLine {
    NewOrderLine { quantity, ..line.clone() }
  }

  async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_one(pool)
      .await
      .unwrap()
  }

  async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
      .fetch_one(pool)
      .await
      .unwrap()
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "needs DATABASE_URL"]
  async fn insert_reports_every_short_product_and_rolls_back(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let user = insert_user(&pool).await;
    let lamp = insert_product(&pool, "Lamp", 10_00, 2).await;
    let desk = insert_product(&pool, "Desk", 90_00, 1).await;
    let chair = insert_product(&pool, "Chair", 40_00, 9).await;

    store.insert_order(new_order(user, vec![lamp.clone()])).await.unwrap();
    assert_eq!(stock_of(&pool, lamp.product_id).await, 1);

    let lines = vec![with_quantity(&lamp, 1), with_quantity(&lamp, 1), with_quantity(&desk, 3), chair.clone()];
    match store.insert_order(new_order(user, lines)).await {
      Err(AppError::InsufficientStock(issues)) => {
        let summary: Vec<_> = issues.iter().map(|i| (i.product_name.as_str(), i.requested, i.available)).collect();
        assert_eq!(summary, vec![("Lamp", 2, 1), ("Desk", 3, 1)]);
      }
      other => panic!("expected insufficient stock, got {:?}", other.map(|d| d.order.id)),
    }

    assert_eq!(stock_of(&pool, lamp.product_id).await, 1);
    assert_eq!(stock_of(&pool, chair.product_id).await, 9);
    assert_eq!(count(&pool, "orders").await, 1);
    assert_eq!(count(&pool, "order_items").await, 1);
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "needs DATABASE_URL"]
  async fn concurrent_orders_cannot_oversell_the_last_unit(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let user = insert_user(&pool).await;
    let lamp = insert_product(&pool, "Lamp", 10_00, 1).await;

    let (a, b) = tokio::join!(
      store.insert_order(new_order(user, vec![lamp.clone()])),
      store.insert_order(new_order(user, vec![lamp.clone()])),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(stock_of(&pool, lamp.product_id).await, 0);
    assert_eq!(count(&pool, "orders").await, 1);
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "needs DATABASE_URL"]
  async fn duplicate_gateway_events_apply_once(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let user = insert_user(&pool).await;
    let lamp = insert_product(&pool, "Lamp", 10_00, 5).await;
    let order = store.insert_order(new_order(user, vec![lamp])).await.unwrap().order;

    let update = PaymentUpdate {
      order_id: order.id,
      user_id: None,
      event_id: Some("evt_1".to_string()),
      kind: PaymentUpdateKind::Succeeded,
      intent_id: Some("pi_1".to_string()),
    };
    match store.apply_payment_update(update.clone()).await.unwrap() {
      PaymentUpdateOutcome::Applied(paid) => {
        assert_eq!((paid.status, paid.payment_status), (OrderStatus::Confirmed, PaymentStatus::Paid));
        assert_eq!(paid.payment_intent_id.as_deref(), Some("pi_1"));
      }
      other => panic!("expected Applied, got {:?}", other),
    }
    assert_eq!(store.apply_payment_update(update).await.unwrap(), PaymentUpdateOutcome::DuplicateEvent);
    assert_eq!(count(&pool, "processed_payment_events").await, 1);
  }

  #[sqlx::test(migrations = "./migrations")]
  #[ignore = "needs DATABASE_URL"]
  async fn cancel_restores_stock_and_intent_id_is_kept(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let user = insert_user(&pool).await;
    let lamp = insert_product(&pool, "Lamp", 10_00, 5).await;
    let lines = vec![with_quantity(&lamp, 2), with_quantity(&lamp, 1)];
    let order = store.insert_order(new_order(user, lines)).await.unwrap().order;
    assert_eq!(stock_of(&pool, lamp.product_id).await, 2);

    assert!(store.attach_payment_intent(order.id, user, "pi_first").await.unwrap());
    assert!(store.attach_payment_intent(order.id, user, "pi_second").await.unwrap());
    assert!(!store.attach_payment_intent(order.id, Uuid::new_v4(), "pi_other").await.unwrap());

    match store.cancel_order(order.id, user).await.unwrap() {
      CancelOutcome::Cancelled(details) => {
        assert_eq!(details.order.status, OrderStatus::Cancelled);
        assert_eq!(details.order.payment_intent_id.as_deref(), Some("pi_first"));
      }
      other => panic!("expected Cancelled, got {:?}", other),
    }
    assert_eq!(stock_of(&pool, lamp.product_id).await, 5);
    assert_eq!(
      store.cancel_order(order.id, user).await.unwrap(),
      CancelOutcome::NotCancellable(OrderStatus::Cancelled)
    );
  }
}
