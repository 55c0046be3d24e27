//! Error taxonomy for catalog operations.
//!
//! Three kinds of failure flow out of the record access boundary:
//! - `Validation`: caller-fixable input problem, surfaced inline next to the
//!   offending field
//! - `NotFound`: a referenced id no longer resolves, surfaced as a non-fatal
//!   notice
//! - `Backend`: the remote call itself failed, surfaced as a dismissible
//!   notice and left for manual retry

use thiserror::Error;

/// Error returned by record access and mutation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
  /// Input failed validation before (or at) the backend boundary.
  #[error("{field}: {message}")]
  Validation {
    field: &'static str,
    message: String,
  },

  /// The referenced record does not exist (anymore).
  #[error("{collection} record {id} not found")]
  NotFound { collection: &'static str, id: i64 },

  /// The remote call failed (network, constraint violation, server error).
  #[error("backend error: {0}")]
  Backend(String),
}

impl StoreError {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation {
      field,
      message: message.into(),
    }
  }

  pub fn not_found(collection: &'static str, id: i64) -> Self {
    Self::NotFound { collection, id }
  }

  pub fn backend(message: impl ToString) -> Self {
    Self::Backend(message.to_string())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Validation { .. })
  }
}
