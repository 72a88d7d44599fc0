// storefront/src/services/order_number.rs

use chrono::Utc;
use rand_core::{OsRng, RngCore};

/// `ORD-{unix_millis}-{NNN}`. Practically unique; the orders table enforces uniqueness.
pub fn generate_order_number() -> String {
  let suffix = OsRng.next_u32() % 1000;
  format_order_number(Utc::now().timestamp_millis(), suffix)
}

pub fn format_order_number(unix_millis: i64, suffix: u32) -> String {
  format!("ORD-{}-{:03}", unix_millis, suffix % 1000)
}
