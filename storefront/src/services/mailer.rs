// storefront/src/services/mailer.rs
use async_trait::async_trait;
use tracing::{info, instrument};

use crate::errors::Result as AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub html_body: String,
}

#[derive(Debug, Clone)]
pub struct SentEmailInfo {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub body_preview: String, // First N chars of body
  pub message_id: String,
}

impl SentEmailInfo {
  pub fn for_email(email: &OutgoingEmail, message_id: String) -> Self {
    let mut body_preview: String = email.html_body.chars().take(50).collect();
    if email.html_body.chars().count() > 50 {
      body_preview.push_str("...");
    }
    Self {
      to: email.to.clone(),
      from: email.from.clone(),
      subject: email.subject.clone(),
      body_preview,
      message_id,
    }
  }
}

/// Hand-off point to an email delivery service.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, email: OutgoingEmail) -> AppResult<SentEmailInfo>;
}

/// Logs deliveries instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  #[instrument(name = "mailer::send", skip(self, email), fields(to = %email.to, subject = %email.subject))]
  async fn send(&self, email: OutgoingEmail) -> AppResult<SentEmailInfo> {
    let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
    info!(%message_id, from = %email.from, "Email handed off (log-only delivery).");
    Ok(SentEmailInfo::for_email(&email, message_id))
  }
}
