// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orka::ContextData;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::views::{OrderView, Pagination};
use super::{page_count, run_pipeline};
use crate::db::OrderFilter;
use crate::errors::AppError;
use crate::models::OrderStatus;
use crate::pipelines::contexts::{CancelOrderCtxData, CheckoutLine, OrderRequest, PlaceOrderCtxData};
use crate::pipelines::place_order_pipeline::CHECKOUT_PAYMENT_METHOD;
use crate::services::pricing::cents_from_major;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;
/// Pages past this are always empty; the cap keeps offsets well inside i64.
const MAX_PAGE: i64 = 1_000_000;

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemPayload {
  pub product_id: Uuid,
  pub quantity: i32,
  /// Unit price the client displayed, in major units.
  pub price: f64,
  pub size: Option<String>,
  pub color: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
  #[serde(default)]
  pub items: Vec<CheckoutItemPayload>,
  #[serde(default)]
  pub shipping_cost: f64,
  pub total_amount: f64,
}

impl CheckoutPayload {
  fn into_request(self) -> Result<OrderRequest, AppError> {
    let items = self
      .items
      .into_iter()
      .map(|item| {
        Ok(CheckoutLine {
          product_id: item.product_id,
          quantity: item.quantity,
          price_cents: cents_from_major("price", item.price)?,
          size: item.size,
          color: item.color,
        })
      })
      .collect::<Result<Vec<_>, AppError>>()?;
    Ok(OrderRequest::Checkout {
      items,
      shipping_cents: cents_from_major("shippingCost", self.shipping_cost)?,
      total_cents: cents_from_major("totalAmount", self.total_amount)?,
    })
  }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FromCartPayload {
  pub shipping_address_id: Uuid,
  pub payment_method: Option<String>,
  pub notes: Option<String>,
  pub promo_code: Option<String>,
}

impl From<FromCartPayload> for OrderRequest {
  fn from(payload: FromCartPayload) -> Self {
    OrderRequest::FromCart {
      shipping_address_id: payload.shipping_address_id,
      payment_method: payload
        .payment_method
        .filter(|method| !method.trim().is_empty())
        .unwrap_or_else(|| CHECKOUT_PAYMENT_METHOD.to_string()),
      notes: payload.notes,
      promo_code: payload.promo_code.filter(|code| !code.is_empty()),
    }
  }
}

#[derive(Deserialize, Debug, Default)]
pub struct ListOrdersQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  pub status: Option<String>,
}

/// Parses an optional status filter; an empty value means no filter.
pub(crate) fn parse_status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>, AppError> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    Some(raw) => raw.parse::<OrderStatus>().map(Some),
    None => Ok(None),
  }
}

pub(crate) fn clamp_paging(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
  let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
  let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT);
  (page, limit)
}

// --- Handlers ---

async fn place_order(
  app_state: &AppState,
  user_id: Uuid,
  request: OrderRequest,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(PlaceOrderCtxData::new(app_state.clone(), user_id, request));
  run_pipeline(app_state, &ctx, "place_order").await?;

  let details = ctx
    .read()
    .created_order
    .clone()
    .ok_or_else(|| AppError::Internal("Order pipeline completed without an order".to_string()))?;
  info!(order_id = %details.order.id, order_number = %details.order.order_number, total_cents = details.order.total_cents, "Order created.");
  Ok(HttpResponse::Created().json(json!({
    "message": "Order created successfully",
    "order": OrderView::from(&details),
  })))
}

#[instrument(name = "handler::create_checkout_order", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_checkout_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CheckoutPayload>,
) -> Result<HttpResponse, AppError> {
  let request = payload.into_inner().into_request()?;
  place_order(app_state.get_ref(), auth_user.user_id, request).await
}

#[instrument(name = "handler::create_order_from_cart", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_order_from_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<FromCartPayload>,
) -> Result<HttpResponse, AppError> {
  place_order(app_state.get_ref(), auth_user.user_id, payload.into_inner().into()).await
}

#[instrument(name = "handler::list_my_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, AppError> {
  let query = query.into_inner();
  let (page, limit) = clamp_paging(query.page, query.limit, DEFAULT_PAGE_LIMIT);
  let filter = OrderFilter {
    user_id: Some(auth_user.user_id),
    status: parse_status_filter(query.status.as_deref())?,
    search: None,
    page,
    limit,
  };

  let result = app_state.store.list_orders(&filter).await?;
  let orders: Vec<OrderView> = result.orders.iter().map(OrderView::from).collect();
  Ok(HttpResponse::Ok().json(json!({
    "orders": orders,
    "pagination": Pagination { page, limit, total: result.total, pages: page_count(result.total, limit) },
  })))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  // Someone else's order reads as missing.
  let details = app_state
    .store
    .find_order_for_user(order_id.into_inner(), auth_user.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  Ok(HttpResponse::Ok().json(OrderView::from(&details)))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(CancelOrderCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    order_id.into_inner(),
  ));
  run_pipeline(app_state.get_ref(), &ctx, "cancel_order").await?;

  let details = ctx
    .read()
    .cancelled
    .clone()
    .ok_or_else(|| AppError::Internal("Cancel pipeline completed without a result".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Order cancelled successfully",
    "order": OrderView::from(&details),
  })))
}
