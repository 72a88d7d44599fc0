// storefront/src/services/pricing.rs

//! Order pricing in integer minor units.

use serde::Serialize;

use crate::errors::{AppError, Result};

pub const TAX_RATE_PERCENT: i64 = 8;
pub const FREE_SHIPPING_THRESHOLD_CENTS: i64 = 100_00;
pub const FLAT_SHIPPING_CENTS: i64 = 10_00;
pub const SAVE10_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoCode {
  /// 10% off the subtotal.
  Save10,
  /// Discount equal to the shipping fee.
  FreeShip,
}

impl PromoCode {
  /// Unknown codes yield `None`; they are ignored, not rejected.
  pub fn parse(code: &str) -> Option<Self> {
    match code {
      "SAVE10" => Some(PromoCode::Save10),
      "FREESHIP" => Some(PromoCode::FreeShip),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
  pub subtotal_cents: i64,
  pub tax_cents: i64,
  pub shipping_cents: i64,
  pub discount_cents: i64,
  pub total_cents: i64,
}

impl OrderTotals {
  fn new(subtotal_cents: i64, tax_cents: i64, shipping_cents: i64, discount_cents: i64) -> Self {
    Self {
      subtotal_cents,
      tax_cents,
      shipping_cents,
      discount_cents,
      total_cents: subtotal_cents + tax_cents + shipping_cents - discount_cents,
    }
  }
}

/// `amount * percent / 100`, rounded half up. `amount` is non-negative.
fn percent_of(amount_cents: i64, percent: i64) -> i64 {
  (amount_cents * percent + 50) / 100
}

pub fn subtotal<I>(lines: I) -> i64
where
  I: IntoIterator<Item = (i64, i32)>,
{
  lines.into_iter().map(|(price_cents, quantity)| price_cents * i64::from(quantity)).sum()
}

pub fn tax_for(subtotal_cents: i64) -> i64 {
  percent_of(subtotal_cents, TAX_RATE_PERCENT)
}

pub fn shipping_for(subtotal_cents: i64) -> i64 {
  if subtotal_cents > FREE_SHIPPING_THRESHOLD_CENTS {
    0
  } else {
    FLAT_SHIPPING_CENTS
  }
}

/// Totals for an order built from the server-side catalog prices.
pub fn quote_cart(subtotal_cents: i64, promo_code: Option<&str>) -> OrderTotals {
  let tax = tax_for(subtotal_cents);
  let shipping = shipping_for(subtotal_cents);
  let discount = match promo_code.and_then(PromoCode::parse) {
    Some(PromoCode::Save10) => percent_of(subtotal_cents, SAVE10_PERCENT),
    Some(PromoCode::FreeShip) => shipping,
    None => 0,
  };
  OrderTotals::new(subtotal_cents, tax, shipping, discount)
}

/// Totals for a direct checkout: tax is recomputed, shipping comes from the request.
pub fn quote_checkout(subtotal_cents: i64, shipping_cents: i64) -> OrderTotals {
  OrderTotals::new(subtotal_cents, tax_for(subtotal_cents), shipping_cents, 0)
}

/// Converts a decimal major-unit amount from a request body into minor units.
pub fn cents_from_major(field: &str, amount: f64) -> Result<i64> {
  if !amount.is_finite() || amount < 0.0 {
    return Err(AppError::Validation(format!("Invalid {}", field)));
  }
  let cents = (amount * 100.0).round();
  if cents > i64::MAX as f64 / 2.0 {
    return Err(AppError::Validation(format!("Invalid {}", field)));
  }
  Ok(cents as i64)
}

pub fn within_tolerance(a_cents: i64, b_cents: i64, tolerance_cents: i64) -> bool {
  (a_cents - b_cents).abs() <= tolerance_cents
}

/// `1999` -> `19.99`, for JSON responses.
pub fn major_from_cents(cents: i64) -> f64 {
  cents as f64 / 100.0
}

/// `12345` -> `"123.45"`.
pub fn format_major(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let abs = cents.unsigned_abs();
  format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
