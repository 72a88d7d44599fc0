// storefront/src/web/handlers/views.rs

//! Response shapes. Orders keep integer cents; amounts leave here in major units.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Address, Order, OrderDetails, OrderItem, OrderStatus, PaymentStatus};
use crate::services::pricing::major_from_cents;

#[derive(Debug, Serialize)]
pub struct ProductRef<'a> {
  pub id: Uuid,
  pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct OrderItemView<'a> {
  pub id: Uuid,
  pub quantity: i32,
  pub price: f64,
  pub size: Option<&'a str>,
  pub color: Option<&'a str>,
  pub product: ProductRef<'a>,
  pub subtotal: f64,
}

impl<'a> From<&'a OrderItem> for OrderItemView<'a> {
  fn from(item: &'a OrderItem) -> Self {
    Self {
      id: item.id,
      quantity: item.quantity,
      price: major_from_cents(item.price_cents),
      size: item.size.as_deref(),
      color: item.color.as_deref(),
      product: ProductRef {
        id: item.product_id,
        name: &item.product_name,
      },
      subtotal: major_from_cents(item.line_total_cents()),
    }
  }
}

/// Order header, plus items and address when they were loaded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView<'a> {
  pub id: Uuid,
  pub order_number: &'a str,
  pub user_id: Uuid,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub payment_method: &'a str,
  pub subtotal: f64,
  pub tax: f64,
  pub shipping: f64,
  pub discount: f64,
  pub total: f64,
  pub tracking_number: Option<&'a str>,
  pub estimated_delivery: Option<DateTime<Utc>>,
  pub notes: Option<&'a str>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_count: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items: Option<Vec<OrderItemView<'a>>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shipping_address: Option<&'a Address>,
}

impl<'a> From<&'a Order> for OrderView<'a> {
  fn from(order: &'a Order) -> Self {
    Self {
      id: order.id,
      order_number: &order.order_number,
      user_id: order.user_id,
      status: order.status,
      payment_status: order.payment_status,
      payment_method: &order.payment_method,
      subtotal: major_from_cents(order.subtotal_cents),
      tax: major_from_cents(order.tax_cents),
      shipping: major_from_cents(order.shipping_cents),
      discount: major_from_cents(order.discount_cents),
      total: major_from_cents(order.total_cents),
      tracking_number: order.tracking_number.as_deref(),
      estimated_delivery: order.estimated_delivery,
      notes: order.notes.as_deref(),
      created_at: order.created_at,
      updated_at: order.updated_at,
      item_count: None,
      items: None,
      shipping_address: None,
    }
  }
}

impl<'a> From<&'a OrderDetails> for OrderView<'a> {
  fn from(details: &'a OrderDetails) -> Self {
    Self {
      item_count: Some(details.items.len()),
      items: Some(details.items.iter().map(OrderItemView::from).collect()),
      shipping_address: details.shipping_address.as_ref(),
      ..OrderView::from(&details.order)
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub page: i64,
  pub limit: i64,
  pub total: i64,
  pub pages: i64,
}
