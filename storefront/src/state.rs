// storefront/src/state.rs
use crate::config::AppConfig;
use crate::db::OrderStore;
use crate::errors::AppError;
use crate::services::mailer::Mailer;
use crate::services::payment_gateway::PaymentGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn OrderStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub mailer: Arc<dyn Mailer>,
  pub orka_instance: Arc<orka::Orka<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the collaborators together and registers every pipeline.
  pub fn new(
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    config: AppConfig,
  ) -> Self {
    let orka_instance = Arc::new(orka::Orka::<AppError>::new());
    crate::pipelines::register_all_pipelines(&orka_instance);
    Self {
      store,
      gateway,
      mailer,
      orka_instance,
      config: Arc::new(config),
    }
  }
}
