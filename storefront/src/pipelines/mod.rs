// storefront/src/pipelines/mod.rs

//! Defines and registers all Orka pipelines used by the order service.

use crate::errors::AppError;
use orka::Orka;

pub mod contexts;

pub mod cancel_order_pipeline;
pub mod payment_event_pipeline;
pub mod payment_intent_pipeline;
pub mod place_order_pipeline;
pub mod webhook_pipeline;

/// Registers every pipeline with `orka_instance`. Called once while building the app state.
pub fn register_all_pipelines(orka_instance: &Orka<AppError>) {
  tracing::info!("Registering Orka pipelines...");

  place_order_pipeline::register_place_order_pipeline(orka_instance);
  cancel_order_pipeline::register_cancel_order_pipeline(orka_instance);
  payment_intent_pipeline::register_payment_intent_pipeline(orka_instance);
  payment_event_pipeline::register_payment_event_pipeline(orka_instance);
  webhook_pipeline::register_webhook_pipeline(orka_instance);

  tracing::info!("All application pipelines registered with Orka.");
}
