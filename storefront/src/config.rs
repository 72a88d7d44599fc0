// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
  Stripe,
  /// In-process gateway; no network calls.
  Mock,
}

impl FromStr for PaymentProvider {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "stripe" => Ok(PaymentProvider::Stripe),
      "mock" => Ok(PaymentProvider::Mock),
      other => Err(AppError::Config(format!("Unknown PAYMENT_PROVIDER '{}'", other))),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub app_base_url: String,
  /// Used for order deep links in notification emails.
  pub frontend_url: String,

  pub payment_provider: PaymentProvider,
  pub stripe_secret_key: String,
  pub stripe_api_base: String,
  pub webhook_secret: String,
  pub webhook_tolerance_secs: i64,
  pub currency: String,
  pub minimum_charge_cents: i64,
  /// Allowed divergence between client-displayed and catalog prices on direct checkout.
  pub price_tolerance_cents: i64,

  pub email_sender: String,
  pub ops_inbox_email: String,

  pub seed_db: bool,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("app_base_url", &self.app_base_url)
      .field("frontend_url", &self.frontend_url)
      .field("payment_provider", &self.payment_provider)
      .field("stripe_api_base", &self.stripe_api_base)
      .field("currency", &self.currency)
      .field("minimum_charge_cents", &self.minimum_charge_cents)
      .field("price_tolerance_cents", &self.price_tolerance_cents)
      .field("seed_db", &self.seed_db)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    fn parsed<T: FromStr>(var_name: &str, raw: String) -> Result<T>
    where
      T::Err: std::fmt::Display,
    {
      raw
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e)))
    }

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port: u16 = parsed("SERVER_PORT", get_env("SERVER_PORT").unwrap_or_else(|_| "8080".to_string()))?;
    let database_url = get_env("DATABASE_URL")?;
    let app_base_url = get_env("APP_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));
    let frontend_url = get_env("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let payment_provider: PaymentProvider = get_env("PAYMENT_PROVIDER")
      .unwrap_or_else(|_| "stripe".to_string())
      .parse()?;
    let stripe_secret_key = match payment_provider {
      PaymentProvider::Stripe => get_env("STRIPE_SECRET_KEY")?,
      PaymentProvider::Mock => get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
    };
    let stripe_api_base = get_env("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string());
    let webhook_secret = get_env("STRIPE_WEBHOOK_SECRET")?;
    let webhook_tolerance_secs: i64 = parsed(
      "WEBHOOK_TOLERANCE_SECS",
      get_env("WEBHOOK_TOLERANCE_SECS").unwrap_or_else(|_| "300".to_string()),
    )?;
    let currency = get_env("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()).to_lowercase();
    let minimum_charge_cents: i64 = parsed(
      "GATEWAY_MINIMUM_CHARGE_CENTS",
      get_env("GATEWAY_MINIMUM_CHARGE_CENTS").unwrap_or_else(|_| "50".to_string()),
    )?;
    let price_tolerance_cents: i64 = parsed(
      "PRICE_TOLERANCE_CENTS",
      get_env("PRICE_TOLERANCE_CENTS").unwrap_or_else(|_| "1".to_string()),
    )?;
    if price_tolerance_cents < 0 {
      return Err(AppError::Config("PRICE_TOLERANCE_CENTS must not be negative".to_string()));
    }

    let email_sender = get_env("EMAIL_SENDER").unwrap_or_else(|_| "noreply@example.com".to_string());
    let ops_inbox_email = get_env("OPS_INBOX_EMAIL").unwrap_or_else(|_| "orders@example.com".to_string());

    let seed_db: bool = parsed("SEED_DB", get_env("SEED_DB").unwrap_or_else(|_| "false".to_string()))?;

    let config = Self {
      server_host,
      server_port,
      database_url,
      app_base_url,
      frontend_url,
      payment_provider,
      stripe_secret_key,
      stripe_api_base,
      webhook_secret,
      webhook_tolerance_secs,
      currency,
      minimum_charge_cents,
      price_tolerance_cents,
      email_sender,
      ops_inbox_email,
      seed_db,
    };
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// Deep link to an order in the customer-facing frontend.
  pub fn order_link(&self, order_id: uuid::Uuid) -> String {
    format!("{}/orders/{}", self.frontend_url.trim_end_matches('/'), order_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn payment_provider_parses_case_insensitively() {
    assert_eq!("Stripe".parse::<PaymentProvider>().unwrap(), PaymentProvider::Stripe);
    assert_eq!(" mock ".parse::<PaymentProvider>().unwrap(), PaymentProvider::Mock);
    assert!("paypal".parse::<PaymentProvider>().is_err());
  }
}
