// storefront/src/pipelines/place_order_pipeline.rs

//! Order creation, shared by the cart and direct-checkout paths.
//!
//! Nothing is written before `commit_order`; every earlier step only reads and validates.

use orka::{ContextData, Orka, Pipeline, PipelineControl};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{NewOrder, NewOrderLine};
use crate::errors::{AppError, Result as AppResult, StockIssue};
use crate::pipelines::contexts::{DraftLine, OrderRequest, PlaceOrderCtxData};
use crate::services::order_number::generate_order_number;
use crate::services::pricing::{self, format_major, within_tolerance};

pub const CHECKOUT_PAYMENT_METHOD: &str = "STRIPE";

pub fn register_place_order_pipeline(orka_registry: &Orka<AppError>) {
  let mut p = Pipeline::<PlaceOrderCtxData, AppError>::new(&[
    ("load_order_lines", false, None),
    ("check_stock", false, None),
    (
      "check_client_pricing",
      false,
      Some(Arc::new(|ctx: ContextData<PlaceOrderCtxData>| ctx.read().is_cart_order())),
    ),
    ("price_order", false, None),
    ("commit_order", false, None),
  ]);

  p.on_root("load_order_lines", load_order_lines);
  p.on_root("check_stock", check_stock);
  p.on_root("check_client_pricing", check_client_pricing);
  p.on_root("price_order", price_order);
  p.on_root("commit_order", commit_order);

  orka_registry.register_pipeline(p);
}

#[instrument(name = "place_order::load_order_lines", skip(ctx_data), err)]
async fn load_order_lines(ctx_data: ContextData<PlaceOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id, request) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.user_id, guard.request.clone())
  };

  let (draft_lines, shipping_address, clear_cart_id) = match request {
    OrderRequest::FromCart {
      shipping_address_id, ..
    } => {
      let cart = store
        .load_cart(user_id)
        .await?
        .filter(|cart| !cart.items.is_empty())
        .ok_or_else(|| AppError::Validation("Cart is empty".to_string()))?;
      let address = store
        .find_address_for_user(shipping_address_id, user_id)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid shipping address".to_string()))?;
      let lines = cart
        .items
        .iter()
        .map(|item| DraftLine {
          product_id: item.product_id,
          quantity: item.quantity,
          client_price_cents: None,
          size: item.size.clone(),
          color: item.color.clone(),
        })
        .collect::<Vec<_>>();
      (lines, Some(address), Some(cart.id))
    }
    OrderRequest::Checkout {
      items, total_cents, ..
    } => {
      if items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".to_string()));
      }
      if total_cents <= 0 {
        return Err(AppError::Validation("Invalid total amount".to_string()));
      }
      if items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::Validation("Item quantity must be at least 1".to_string()));
      }
      let lines = items
        .into_iter()
        .map(|item| DraftLine {
          product_id: item.product_id,
          quantity: item.quantity,
          client_price_cents: Some(item.price_cents),
          size: item.size.filter(|s| !s.is_empty()),
          color: item.color.filter(|c| !c.is_empty()),
        })
        .collect::<Vec<_>>();
      (lines, None, None)
    }
  };

  let product_ids: Vec<Uuid> = draft_lines.iter().map(|line| line.product_id).collect();
  let catalog: HashMap<Uuid, _> = store
    .find_products(&product_ids)
    .await?
    .into_iter()
    .map(|product| (product.id, product))
    .collect();
  if let Some(missing) = draft_lines.iter().find(|line| !catalog.contains_key(&line.product_id)) {
    return Err(AppError::NotFound(format!("Product not found: {}", missing.product_id)));
  }

  info!(lines = draft_lines.len(), "Order lines loaded.");
  let mut guard = ctx_data.write();
  guard.draft_lines = draft_lines;
  guard.catalog = catalog;
  guard.shipping_address = shipping_address;
  guard.clear_cart_id = clear_cart_id;
  Ok(PipelineControl::Continue)
}

/// Rejects the order if any product is short, listing every short product.
#[instrument(name = "place_order::check_stock", skip(ctx_data), err)]
async fn check_stock(ctx_data: ContextData<PlaceOrderCtxData>) -> AppResult<PipelineControl> {
  let guard = ctx_data.read();

  // Lines for the same product draw on the same stock. Summed in i64 so repeated large lines cannot wrap.
  let mut requested: Vec<(Uuid, i64)> = Vec::new();
  for line in &guard.draft_lines {
    let quantity = i64::from(line.quantity);
    match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
      Some((_, qty)) => *qty += quantity,
      None => requested.push((line.product_id, quantity)),
    }
  }

  let issues: Vec<StockIssue> = requested
    .into_iter()
    .filter_map(|(product_id, qty)| {
      let product = guard.catalog.get(&product_id)?;
      (i64::from(product.stock) < qty).then(|| StockIssue {
        product_name: product.name.clone(),
        requested: qty,
        available: product.stock,
      })
    })
    .collect();

  if issues.is_empty() {
    Ok(PipelineControl::Continue)
  } else {
    warn!(short_lines = issues.len(), "Order rejected for insufficient stock.");
    Err(AppError::InsufficientStock(issues))
  }
}

/// Direct checkout only: client prices and total must match the catalog within tolerance.
#[instrument(name = "place_order::check_client_pricing", skip(ctx_data), err)]
async fn check_client_pricing(ctx_data: ContextData<PlaceOrderCtxData>) -> AppResult<PipelineControl> {
  let guard = ctx_data.read();
  let OrderRequest::Checkout {
    shipping_cents,
    total_cents,
    ..
  } = guard.request
  else {
    return Ok(PipelineControl::Continue);
  };
  let tolerance = guard.app_state.config.price_tolerance_cents;

  let mismatches: Vec<String> = guard
    .draft_lines
    .iter()
    .filter_map(|line| {
      let product = guard.catalog.get(&line.product_id)?;
      let submitted = line.client_price_cents?;
      (!within_tolerance(submitted, product.price_cents, tolerance)).then(|| {
        format!(
          "{}: submitted {}, current price {}",
          product.name,
          format_major(submitted),
          format_major(product.price_cents)
        )
      })
    })
    .collect();
  if !mismatches.is_empty() {
    return Err(AppError::Validation(format!("Price mismatch. {}", mismatches.join("; "))));
  }

  let subtotal = pricing::subtotal(
    guard
      .draft_lines
      .iter()
      .map(|line| (line.client_price_cents.unwrap_or_default(), line.quantity)),
  );
  let expected = pricing::quote_checkout(subtotal, shipping_cents).total_cents;
  if !within_tolerance(total_cents, expected, tolerance) {
    return Err(AppError::Validation(format!(
      "Total amount {} does not match order pricing {}",
      format_major(total_cents),
      format_major(expected)
    )));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "place_order::price_order", skip(ctx_data))]
async fn price_order(ctx_data: ContextData<PlaceOrderCtxData>) -> AppResult<PipelineControl> {
  let mut guard = ctx_data.write();
  let mut priced_lines = Vec::with_capacity(guard.draft_lines.len());
  for line in &guard.draft_lines {
    let product = guard
      .catalog
      .get(&line.product_id)
      .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", line.product_id)))?;
    priced_lines.push(NewOrderLine {
      product_id: product.id,
      product_name: product.name.clone(),
      quantity: line.quantity,
      // Cart orders take the price read at validation time.
      price_cents: line.client_price_cents.unwrap_or(product.price_cents),
      size: line.size.clone(),
      color: line.color.clone(),
    });
  }

  let subtotal = pricing::subtotal(priced_lines.iter().map(|line| (line.price_cents, line.quantity)));
  let totals = match &guard.request {
    OrderRequest::FromCart { promo_code, .. } => pricing::quote_cart(subtotal, promo_code.as_deref()),
    OrderRequest::Checkout { shipping_cents, .. } => pricing::quote_checkout(subtotal, *shipping_cents),
  };
  info!(
    subtotal_cents = totals.subtotal_cents,
    discount_cents = totals.discount_cents,
    total_cents = totals.total_cents,
    "Order priced."
  );
  guard.priced_lines = priced_lines;
  guard.totals = Some(totals);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "place_order::commit_order", skip(ctx_data), err)]
async fn commit_order(ctx_data: ContextData<PlaceOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, new_order, shipping_address) = {
    let guard = ctx_data.read();
    let totals = guard
      .totals
      .ok_or_else(|| AppError::Internal("commit_order reached without totals".to_string()))?;
    let (payment_method, shipping_address_id, notes) = match &guard.request {
      OrderRequest::FromCart {
        payment_method,
        shipping_address_id,
        notes,
        ..
      } => (payment_method.clone(), Some(*shipping_address_id), notes.clone()),
      OrderRequest::Checkout { .. } => (CHECKOUT_PAYMENT_METHOD.to_string(), None, None),
    };
    let new_order = NewOrder {
      order_number: generate_order_number(),
      user_id: guard.user_id,
      payment_method,
      shipping_address_id,
      notes,
      totals,
      lines: guard.priced_lines.clone(),
      clear_cart_id: guard.clear_cart_id,
    };
    (guard.app_state.store.clone(), new_order, guard.shipping_address.clone())
  };

  let mut created = store.insert_order(new_order).await?;
  created.shipping_address = shipping_address;
  info!(
    order_id = %created.order.id,
    order_number = %created.order.order_number,
    "Order created."
  );
  ctx_data.write().created_order = Some(created);
  Ok(PipelineControl::Continue)
}
