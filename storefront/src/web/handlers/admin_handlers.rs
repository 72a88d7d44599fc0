// storefront/src/web/handlers/admin_handlers.rs

//! Back-office order views. Callers must be authenticated; role checks happen upstream.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::order_handlers::{clamp_paging, parse_status_filter};
use super::page_count;
use super::views::{OrderView, Pagination};
use crate::db::{FulfillmentUpdate, OrderFilter};
use crate::errors::AppError;
use crate::models::OrderStatus;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

const ADMIN_PAGE_LIMIT: i64 = 20;

#[derive(Deserialize, Debug, Default)]
pub struct AdminOrdersQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  pub status: Option<String>,
  pub search: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
  pub status: String,
  pub tracking_number: Option<String>,
  pub estimated_delivery: Option<String>,
}

impl StatusUpdatePayload {
  fn into_update(self) -> Result<FulfillmentUpdate, AppError> {
    let status: OrderStatus = self.status.trim().parse()?;
    let estimated_delivery = match self.estimated_delivery.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      Some(raw) => Some(
        DateTime::parse_from_rfc3339(raw)
          .map_err(|_| AppError::Validation("Invalid estimatedDelivery".to_string()))?
          .with_timezone(&Utc),
      ),
      None => None,
    };
    Ok(FulfillmentUpdate {
      status,
      tracking_number: self.tracking_number.filter(|t| !t.trim().is_empty()),
      estimated_delivery,
    })
  }
}

#[instrument(name = "handler::admin_list_orders", skip(app_state, auth_user), fields(caller = %auth_user.user_id))]
pub async fn list_all_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<AdminOrdersQuery>,
) -> Result<HttpResponse, AppError> {
  let query = query.into_inner();
  let (page, limit) = clamp_paging(query.page, query.limit, ADMIN_PAGE_LIMIT);
  let filter = OrderFilter {
    user_id: None,
    status: parse_status_filter(query.status.as_deref())?,
    search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
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

#[instrument(name = "handler::admin_update_status", skip(app_state, auth_user, payload), fields(caller = %auth_user.user_id))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<StatusUpdatePayload>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let update = payload.into_inner().into_update()?;
  let status = update.status;

  let order = app_state
    .store
    .update_fulfillment(order_id, update)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  info!(%order_id, %status, payment_status = %order.payment_status, "Order status updated by administrator.");

  Ok(HttpResponse::Ok().json(json!({
    "message": "Order status updated successfully",
    "order": OrderView::from(&order),
  })))
}
