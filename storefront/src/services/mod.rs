// storefront/src/services/mod.rs
pub mod gateway_events;
pub mod lifecycle;
pub mod mailer;
pub mod notifications;
pub mod order_number;
pub mod payment_gateway;
pub mod payment_mock;
pub mod pricing;
pub mod stripe;
pub mod webhook_signature;
