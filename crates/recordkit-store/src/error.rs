//! Error kinds surfaced by record stores and the record families built on them.

use std::fmt::Display;

/// Errors raised by store operations.
///
/// Every mutating operation that returns one of these leaves the store
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {key}")]
    NotFound { key: String },

    #[error("record already exists: {key}")]
    DuplicateKey { key: String },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("record {key}: cannot {action} while {from}")]
    InvalidStateTransition {
        key: String,
        from: String,
        action: String,
    },

    #[error("record {key} is held by {holder}, not {requested_by}")]
    NotHolder {
        key: String,
        holder: String,
        requested_by: String,
    },

    #[error("insufficient funds: available {available:.2}, requested {requested:.2}")]
    InsufficientFunds { available: f64, requested: f64 },

    #[error("automatic keys exhausted")]
    KeysExhausted,
}

impl StoreError {
    pub fn not_found(key: &(impl Display + ?Sized)) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub fn duplicate_key(key: &(impl Display + ?Sized)) -> Self {
        Self::DuplicateKey {
            key: key.to_string(),
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::NotHolder { .. } => "not_holder",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::KeysExhausted => "keys_exhausted",
        }
    }
}
