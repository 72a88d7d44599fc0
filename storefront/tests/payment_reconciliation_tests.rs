// tests/payment_reconciliation_tests.rs
mod common;
use common::*;

use orka::ContextData;
use serial_test::serial;
use storefront::db::{OrderStore, PaymentUpdateKind, PaymentUpdateOutcome};
use storefront::errors::AppError;
use storefront::models::{OrderDetails, OrderStatus, PaymentStatus, User};
use storefront::pipelines::contexts::{OrderRequest, PaymentEventCtxData, PaymentIntentCtxData, PaymentSource};
use storefront::services::webhook_signature::sign_payload;
use uuid::Uuid;

async fn pending_order(app: &TestApp, price_cents: i64, qty: i32) -> (User, OrderDetails) {
  let (user, address) = app.customer();
  let product = app.product("Tee", price_cents, 10);
  let details = app.place_from_cart(&user, &address, &[(&product, qty)], None).await.unwrap();
  (user, details)
}

async fn request_intent(app: &TestApp, user_id: Uuid, order_id: Uuid) -> Result<ContextData<PaymentIntentCtxData>, AppError> {
  let ctx = ContextData::new(PaymentIntentCtxData::new(app.state.clone(), user_id, order_id));
  app.state.orka_instance.run(ctx.clone()).await?;
  Ok(ctx)
}

async fn current(app: &TestApp, order_id: Uuid) -> OrderDetails {
  app.store.find_order(order_id).await.unwrap().unwrap()
}

#[tokio::test]
#[serial]
async fn intent_carries_order_metadata_and_is_persisted() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 3).await;

  let ctx = request_intent(&app, user.id, details.order.id).await.unwrap();
  let intent = ctx.read().intent.clone().unwrap();
  assert!(intent.client_secret.starts_with(&intent.id));

  let requests = app.gateway.requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].amount_cents, 162_00);
  assert_eq!(requests[0].currency, "usd");
  assert_eq!(requests[0].metadata.get("orderId"), Some(&details.order.id.to_string()));
  assert_eq!(requests[0].metadata.get("orderNumber"), Some(&details.order.order_number));
  assert_eq!(requests[0].metadata.get("userId"), Some(&user.id.to_string()));

  assert_eq!(current(&app, details.order.id).await.order.payment_intent_id, Some(intent.id));
}

#[tokio::test]
#[serial]
async fn reopening_an_intent_keeps_the_first_intent_id() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 1).await;

  let first = request_intent(&app, user.id, details.order.id).await.unwrap().read().intent.clone().unwrap();
  let second = request_intent(&app, user.id, details.order.id).await.unwrap().read().intent.clone().unwrap();
  assert_ne!(first.id, second.id);
  assert_eq!(app.gateway.requests().len(), 2);

  assert_eq!(current(&app, details.order.id).await.order.payment_intent_id, Some(first.id));
}

#[tokio::test]
#[serial]
async fn amounts_below_gateway_minimum_never_reach_the_gateway() {
  let app = TestApp::new();
  let (user, _) = app.customer();
  // 0.28 + 0.02 tax, no shipping.
  let tiny = app.product("Sticker", 14, 10);
  let checkout = app
    .place(
      user.id,
      OrderRequest::Checkout {
        items: vec![checkout_line(&tiny, 2, 14)],
        shipping_cents: 0,
        total_cents: 30,
      },
    )
    .await
    .unwrap();
  assert_eq!(checkout.order.total_cents, 30);

  let err = request_intent(&app, user.id, checkout.order.id).await.err().unwrap();
  match err {
    AppError::Validation(msg) => assert!(msg == "Order amount 0.30 is below the minimum chargeable amount of 0.50 USD", "{}", msg),
    other => panic!("expected Validation, got {:?}", other),
  }
  assert_eq!(app.gateway.call_count(), 0);
  assert_eq!(current(&app, checkout.order.id).await.order.payment_intent_id, None);
}

#[tokio::test]
#[serial]
async fn gateway_failure_leaves_order_untouched() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 1).await;
  app.gateway.fail_next_call();

  let err = request_intent(&app, user.id, details.order.id).await.err().unwrap();
  assert!(matches!(err, AppError::Gateway(_)), "{:?}", err);

  let after = current(&app, details.order.id).await.order;
  assert_eq!(after.payment_intent_id, None);
  assert_eq!(after.status, OrderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn intents_are_refused_for_foreign_paid_or_cancelled_orders() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 1).await;
  let (stranger, _) = app.customer();

  let err = request_intent(&app, stranger.id, details.order.id).await.err().unwrap();
  assert!(matches!(err, AppError::NotFound(_)), "{:?}", err);

  app.store.set_order_status(details.order.id, OrderStatus::Confirmed, PaymentStatus::Paid);
  let err = request_intent(&app, user.id, details.order.id).await.err().unwrap();
  assert!(matches!(err, AppError::Conflict(ref m) if m == "Order already paid"), "{:?}", err);

  app.store.set_order_status(details.order.id, OrderStatus::Cancelled, PaymentStatus::Refunded);
  let err = request_intent(&app, user.id, details.order.id).await.err().unwrap();
  assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
  assert_eq!(app.gateway.call_count(), 0);
}

#[tokio::test]
#[serial]
async fn succeeded_webhook_confirms_order_and_notifies_once() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 3).await;
  let order_id = details.order.id;

  let body = succeeded_event("evt_success_1", Some(order_id));
  let ctx = app.deliver_signed(&body).await.unwrap();
  assert!(ctx.read().acknowledged);
  assert!(matches!(ctx.read().routed_outcome, Some(PaymentUpdateOutcome::Applied(_))));

  let after = current(&app, order_id).await.order;
  assert_eq!(after.status, OrderStatus::Confirmed);
  assert_eq!(after.payment_status, PaymentStatus::Paid);
  assert_eq!(after.payment_intent_id.as_deref(), Some("pi_test_1"));

  let sent = app.mailer.sent();
  assert_eq!(sent.len(), 2);
  assert_eq!(sent[0].to, user.email);
  assert!(sent[0].subject.contains(&details.order.order_number));
  assert!(sent[0].html_body.contains(&format!("https://shop.example.com/orders/{}", order_id)));
  assert_eq!(sent[1].to, "orders@example.com");

  // Redelivery of the same event changes nothing.
  let ctx = app.deliver_signed(&body).await.unwrap();
  assert!(matches!(ctx.read().routed_outcome, Some(PaymentUpdateOutcome::DuplicateEvent)));
  // A different event for an already paid order is a no-op too.
  let ctx = app.deliver_signed(&succeeded_event("evt_success_2", Some(order_id))).await.unwrap();
  assert!(matches!(ctx.read().routed_outcome, Some(PaymentUpdateOutcome::AlreadyPaid(_))));

  assert_eq!(app.mailer.count(), 2);
  assert_eq!(current(&app, order_id).await.order.status, OrderStatus::Confirmed);
}

#[tokio::test]
#[serial]
async fn failed_payment_marks_failure_without_restocking() {
  let app = TestApp::new();
  let (user, address) = app.customer();
  let tee = app.product("Tee", 50_00, 10);
  let details = app.place_from_cart(&user, &address, &[(&tee, 2)], None).await.unwrap();

  app.deliver_signed(&failed_event("evt_fail_1", Some(details.order.id))).await.unwrap();

  let after = current(&app, details.order.id).await.order;
  assert_eq!(after.status, OrderStatus::Pending);
  assert_eq!(after.payment_status, PaymentStatus::Failed);
  assert_eq!(app.store.product_stock(tee.id), Some(8));
  assert_eq!(app.mailer.count(), 0);

  // The customer can retry and still pay.
  app.deliver_signed(&succeeded_event("evt_success_retry", Some(details.order.id))).await.unwrap();
  let after = current(&app, details.order.id).await.order;
  assert_eq!((after.status, after.payment_status), (OrderStatus::Confirmed, PaymentStatus::Paid));
}

#[tokio::test]
#[serial]
async fn late_failure_never_downgrades_a_paid_order() {
  let app = TestApp::new();
  let (_, details) = pending_order(&app, 50_00, 1).await;
  app.deliver_signed(&succeeded_event("evt_ok", Some(details.order.id))).await.unwrap();

  let ctx = app.deliver_signed(&failed_event("evt_late_fail", Some(details.order.id))).await.unwrap();
  assert!(matches!(ctx.read().routed_outcome, Some(PaymentUpdateOutcome::Ignored(_))));
  let after = current(&app, details.order.id).await.order;
  assert_eq!((after.status, after.payment_status), (OrderStatus::Confirmed, PaymentStatus::Paid));
}

#[tokio::test]
#[serial]
async fn bad_signatures_are_rejected_before_any_state_change() {
  let app = TestApp::new();
  let (_, details) = pending_order(&app, 50_00, 1).await;
  let body = succeeded_event("evt_forged", Some(details.order.id));

  let err = app.deliver_webhook(&body, None).await.err().unwrap();
  assert!(matches!(err, AppError::WebhookSignature(_)), "{:?}", err);

  let forged = sign_payload("whsec_other", chrono::Utc::now().timestamp(), &body).unwrap();
  let err = app.deliver_webhook(&body, Some(forged)).await.err().unwrap();
  assert!(matches!(err, AppError::WebhookSignature(_)), "{:?}", err);

  // Signed for a different body.
  let err = app.deliver_webhook(&body, Some(sign(b"{}"))).await.err().unwrap();
  assert!(matches!(err, AppError::WebhookSignature(_)), "{:?}", err);

  assert_eq!(current(&app, details.order.id).await.order.status, OrderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn events_for_unknown_orders_are_reported_and_left_retryable() {
  let app = TestApp::new();

  let err = app.deliver_signed(&succeeded_event("evt_orphan", None)).await.err().unwrap();
  assert!(matches!(err, AppError::UnresolvedPaymentEvent(_)), "{:?}", err);

  let missing = Uuid::new_v4();
  let err = app.deliver_signed(&succeeded_event("evt_orphan_2", Some(missing))).await.err().unwrap();
  assert!(matches!(err, AppError::UnresolvedPaymentEvent(_)), "{:?}", err);
}

#[tokio::test]
#[serial]
async fn unrelated_event_types_are_acknowledged() {
  let app = TestApp::new();
  let body = serde_json::json!({"id": "evt_misc", "type": "charge.refunded", "data": {"object": {}}})
    .to_string()
    .into_bytes();

  let ctx = app.deliver_signed(&body).await.unwrap();
  assert!(ctx.read().acknowledged);
  assert!(ctx.read().routed_outcome.is_none());
}

#[tokio::test]
#[serial]
async fn mail_failure_does_not_undo_payment() {
  let app = TestApp::new();
  let (_, details) = pending_order(&app, 50_00, 1).await;
  app.mailer.set_failing(true);

  let ctx = app.deliver_signed(&succeeded_event("evt_mail_down", Some(details.order.id))).await.unwrap();
  assert!(ctx.read().acknowledged);

  let after = current(&app, details.order.id).await.order;
  assert_eq!((after.status, after.payment_status), (OrderStatus::Confirmed, PaymentStatus::Paid));
  assert_eq!(app.mailer.count(), 0);
}

#[tokio::test]
#[serial]
async fn client_confirmation_shares_the_gateway_transition() {
  let app = TestApp::new();
  let (user, details) = pending_order(&app, 50_00, 1).await;

  let confirm = |user_id: Uuid| {
    let ctx = ContextData::new(PaymentEventCtxData::new(
      app.state.clone(),
      Some(details.order.id),
      PaymentUpdateKind::Succeeded,
      PaymentSource::Client { user_id },
    ));
    let state = app.state.clone();
    async move {
      state.orka_instance.run(ctx.clone()).await?;
      Ok::<_, AppError>(ctx)
    }
  };

  let (stranger, _) = app.customer();
  let err = confirm(stranger.id).await.err().unwrap();
  assert!(matches!(err, AppError::NotFound(_)), "{:?}", err);

  let ctx = confirm(user.id).await.unwrap();
  assert!(ctx.read().notifications_sent);
  assert!(matches!(ctx.read().outcome, Some(PaymentUpdateOutcome::Applied(_))));
  assert_eq!(app.mailer.count(), 2);

  // A webhook arriving afterwards finds the order already paid and sends nothing.
  let ctx = app.deliver_signed(&succeeded_event("evt_after_client", Some(details.order.id))).await.unwrap();
  assert!(matches!(ctx.read().routed_outcome, Some(PaymentUpdateOutcome::AlreadyPaid(_))));
  assert_eq!(app.mailer.count(), 2);

  app.store.set_order_status(details.order.id, OrderStatus::Cancelled, PaymentStatus::Refunded);
  let err = confirm(user.id).await.err().unwrap();
  assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}
