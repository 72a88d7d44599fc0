// storefront/src/services/lifecycle.rs

//! Joint (status, paymentStatus) transitions of an order.
//!
//! Pure functions; the stores call them while holding the order row so that the decision and
//! the write happen atomically.

use crate::models::{OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Apply {
    status: OrderStatus,
    payment_status: PaymentStatus,
  },
  /// Payment already recorded; nothing to write and no side effects to fire.
  AlreadyPaid,
  /// The event does not apply in the current state and is dropped.
  Ignored,
  /// The request is not allowed in the current state.
  Rejected,
}

impl Transition {
  pub fn is_apply(&self) -> bool {
    matches!(self, Transition::Apply { .. })
  }
}

pub fn on_payment_succeeded(status: OrderStatus, payment_status: PaymentStatus) -> Transition {
  if payment_status == PaymentStatus::Paid {
    return Transition::AlreadyPaid;
  }
  match status {
    OrderStatus::Pending => Transition::Apply {
      status: OrderStatus::Confirmed,
      payment_status: PaymentStatus::Paid,
    },
    _ => Transition::Rejected,
  }
}

/// A failed charge keeps the order open for another attempt and never touches stock.
pub fn on_payment_failed(status: OrderStatus, payment_status: PaymentStatus) -> Transition {
  match (status, payment_status) {
    (OrderStatus::Pending, PaymentStatus::Pending | PaymentStatus::Failed) => Transition::Apply {
      status: OrderStatus::Pending,
      payment_status: PaymentStatus::Failed,
    },
    _ => Transition::Ignored,
  }
}

pub fn is_cancellable(status: OrderStatus) -> bool {
  matches!(status, OrderStatus::Pending | OrderStatus::Confirmed)
}

pub fn on_cancel(status: OrderStatus) -> Transition {
  if is_cancellable(status) {
    Transition::Apply {
      status: OrderStatus::Cancelled,
      payment_status: PaymentStatus::Refunded,
    }
  } else {
    Transition::Rejected
  }
}

/// Administrative override. Marking an order shipped records it as paid.
pub fn on_admin_status(new_status: OrderStatus, payment_status: PaymentStatus) -> (OrderStatus, PaymentStatus) {
  match new_status {
    OrderStatus::Shipped => (OrderStatus::Shipped, PaymentStatus::Paid),
    other => (other, payment_status),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use OrderStatus::*;

  #[test]
  fn success_confirms_a_pending_order() {
    assert_eq!(
      on_payment_succeeded(Pending, PaymentStatus::Pending),
      Transition::Apply {
        status: Confirmed,
        payment_status: PaymentStatus::Paid
      }
    );
    // A retry after a failed attempt is still payable.
    assert!(on_payment_succeeded(Pending, PaymentStatus::Failed).is_apply());
  }

  #[test]
  fn success_is_idempotent_once_paid() {
    for status in OrderStatus::ALL {
      assert_eq!(on_payment_succeeded(status, PaymentStatus::Paid), Transition::AlreadyPaid);
    }
  }

  #[test]
  fn success_on_cancelled_order_is_rejected() {
    assert_eq!(on_payment_succeeded(Cancelled, PaymentStatus::Refunded), Transition::Rejected);
  }

  #[test]
  fn failure_never_downgrades_paid_or_closed_orders() {
    assert_eq!(on_payment_failed(Confirmed, PaymentStatus::Paid), Transition::Ignored);
    assert_eq!(on_payment_failed(Cancelled, PaymentStatus::Refunded), Transition::Ignored);
    assert_eq!(
      on_payment_failed(Pending, PaymentStatus::Pending),
      Transition::Apply {
        status: Pending,
        payment_status: PaymentStatus::Failed
      }
    );
  }

  #[test]
  fn only_pending_and_confirmed_orders_cancel() {
    let cancellable: Vec<OrderStatus> = OrderStatus::ALL.into_iter().filter(|s| on_cancel(*s).is_apply()).collect();
    assert_eq!(cancellable, vec![Pending, Confirmed]);
  }

  #[test]
  fn shipping_forces_paid() {
    assert_eq!(on_admin_status(Shipped, PaymentStatus::Pending), (Shipped, PaymentStatus::Paid));
    assert_eq!(on_admin_status(Processing, PaymentStatus::Pending), (Processing, PaymentStatus::Pending));
  }
}
