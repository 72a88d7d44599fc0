// storefront/src/main.rs

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use storefront::config::{AppConfig, PaymentProvider};
use storefront::db::{postgres::seed_demo_catalog, OrderStore, PgOrderStore};
use storefront::services::mailer::{LogMailer, Mailer};
use storefront::services::payment_gateway::PaymentGateway;
use storefront::services::payment_mock::MockGateway;
use storefront::services::stripe::StripeGateway;
use storefront::state::AppState;
use storefront::web::configure_app_routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // LOG_FORMAT=json switches to structured output for log shippers.
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE);
  if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
    subscriber.json().init();
  } else {
    subscriber.init();
  }

  tracing::info!("Starting order service...");

  let app_config = AppConfig::from_env().context("loading configuration")?;

  let db_pool = PgPoolOptions::new()
    .max_connections(10)
    .connect(&app_config.database_url)
    .await
    .context("connecting to the database")?;
  tracing::info!("Successfully connected to the database.");

  let pg_store = PgOrderStore::new(db_pool);
  pg_store.migrate().await.context("running migrations")?;
  if app_config.seed_db {
    seed_demo_catalog(pg_store.pool()).await.context("seeding demo catalog")?;
    tracing::info!("Demo catalog seeded.");
  }

  let gateway: Arc<dyn PaymentGateway> = match app_config.payment_provider {
    PaymentProvider::Stripe => Arc::new(
      StripeGateway::new(&app_config.stripe_api_base, &app_config.stripe_secret_key)
        .context("building payment gateway client")?,
    ),
    PaymentProvider::Mock => {
      tracing::warn!("PAYMENT_PROVIDER=mock; payment intents are simulated in-process.");
      Arc::new(MockGateway::new())
    }
  };
  let store: Arc<dyn OrderStore> = Arc::new(pg_store);
  let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::default());

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let base_url = app_config.app_base_url.clone();
  let app_state = AppState::new(store, gateway, mailer, app_config);

  tracing::info!(%base_url, "Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;

  Ok(())
}
