// storefront/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: Uuid,
  pub email: String,
  pub name: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("Valued Customer")
  }
}
