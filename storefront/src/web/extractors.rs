// storefront/src/web/extractors.rs

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// The caller's identity, established upstream and forwarded in `X-User-ID`.
///
/// Token issuance and verification happen outside this service; a missing or malformed
/// header is rejected with 401 before any handler runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let parsed = req
      .headers()
      .get(USER_ID_HEADER)
      .and_then(|value| value.to_str().ok())
      .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    match parsed {
      Some(user_id) => ready(Ok(AuthenticatedUser { user_id })),
      None => {
        warn!(path = %req.path(), "Request without a valid X-User-ID header.");
        ready(Err(AppError::Auth("Authentication required".to_string())))
      }
    }
  }
}
