// storefront/src/services/webhook_signature.rs

//! Gateway webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. Each `v1` value is
//! `hex(HMAC-SHA256(secret, "{t}.{raw_body}"))`; any one matching value is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
  #[error("missing signature header")]
  MissingHeader,
  #[error("malformed signature header")]
  MalformedHeader,
  #[error("timestamp outside tolerance")]
  StaleTimestamp,
  #[error("no matching signature")]
  Mismatch,
  #[error("invalid signing secret")]
  InvalidSecret,
}

struct ParsedHeader<'a> {
  timestamp: i64,
  signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, SignatureError> {
  let mut timestamp = None;
  let mut signatures = Vec::new();
  for part in header.split(',') {
    let (key, value) = part.trim().split_once('=').ok_or(SignatureError::MalformedHeader)?;
    match key {
      "t" => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?),
      "v1" => signatures.push(value),
      // Other schemes (v0 test signatures and the like) are not accepted.
      _ => {}
    }
  }
  let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
  if signatures.is_empty() {
    return Err(SignatureError::MalformedHeader);
  }
  Ok(ParsedHeader { timestamp, signatures })
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(payload);
  Ok(mac)
}

/// Checks `header` against the raw request body. Runs before the body is parsed.
pub fn verify_signature(
  payload: &[u8],
  header: Option<&str>,
  secret: &str,
  tolerance_secs: i64,
  now_unix: i64,
) -> Result<(), SignatureError> {
  let header = header.filter(|h| !h.trim().is_empty()).ok_or(SignatureError::MissingHeader)?;
  let parsed = parse_header(header)?;

  // The header is unauthenticated here, so extreme timestamps must not overflow.
  let skew = now_unix.checked_sub(parsed.timestamp).map(i64::unsigned_abs);
  if skew.map_or(true, |skew| skew > tolerance_secs.max(0) as u64) {
    return Err(SignatureError::StaleTimestamp);
  }

  let mac = signing_mac(secret, parsed.timestamp, payload)?;
  let matched = parsed.signatures.iter().any(|candidate| match hex::decode(candidate) {
    Ok(expected) => mac.clone().verify_slice(&expected).is_ok(),
    Err(_) => false,
  });
  if matched {
    Ok(())
  } else {
    Err(SignatureError::Mismatch)
  }
}

/// Produces a header value in the gateway's format. Used to sign test deliveries.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
  let mac = signing_mac(secret, timestamp, payload)?;
  Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}
