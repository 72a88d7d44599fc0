// storefront/src/models/address.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
  pub id: Uuid,
  pub user_id: Uuid,
  pub full_name: String,
  pub line1: String,
  pub line2: Option<String>,
  pub city: String,
  pub state: String,
  pub postal_code: String,
  pub country: String,
}

impl Address {
  /// Multi-line postal rendering used in notification emails.
  pub fn to_postal_lines(&self) -> String {
    let mut lines = vec![self.full_name.clone(), self.line1.clone()];
    if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
      lines.push(line2.to_string());
    }
    lines.push(format!("{}, {} {}", self.city, self.state, self.postal_code));
    lines.push(self.country.clone());
    lines.join("\n")
  }
}
