// SPDX-License-Identifier: MIT

//! Shared error type for domain-level validation failures.

use thiserror::Error;

/// Errors raised while constructing or validating core domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("file record not found: {0}")]
    RecordNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
