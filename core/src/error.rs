// src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrkaError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context dispatch (expected {expected_type}, step: '{step_name}')")]
  TypeMismatch { step_name: String, expected_type: String },

  #[error("Error in user-provided handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error for step '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  #[error("Internal Orka error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for OrkaError {
  fn from(err: AnyhowError) -> Self {
    // An OrkaError that went through anyhow keeps its own variant.
    match err.downcast::<OrkaError>() {
      Ok(orka_err) => orka_err,
      Err(source) => OrkaError::HandlerError { source },
    }
  }
}

pub type OrkaResult<T, E = OrkaError> = std::result::Result<T, E>;
