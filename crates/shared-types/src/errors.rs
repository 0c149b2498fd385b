//! # Error Types
//!
//! The request-level error taxonomy. Every failure surfaced by the action
//! pipeline is one of these variants.

use crate::time::Timestamp;
use thiserror::Error;

/// Errors returned to API callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Descriptor requires authentication and none was supplied.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Credentials were supplied but could not be verified.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authorization predicate returned false.
    #[error("Forbidden: {action_type} not permitted for this identity")]
    Unauthorized { action_type: String },

    /// Payload shape or state precondition is wrong.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Presented version stamp does not match the stored one.
    #[error("client graph outdated: presented {presented:?}, current {current}")]
    StaleGraph {
        presented: Option<Timestamp>,
        current: Timestamp,
    },

    /// Storage or transaction failure.
    #[error("Transaction failed: {0}")]
    Storage(String),

    /// Caller must acknowledge a root pubkey replacement first.
    #[error("Root pubkey replacement pending: acknowledge trusted root before submitting graph updates")]
    TrustReplacementPending,

    /// A plugin broke its contract with the pipeline.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Unknown action type or missing object.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fatal wiring problem detected at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (task join, poisoned state).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP-class status code for the wire response.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::AuthenticationRequired | ApiError::AuthenticationFailed(_) => 401,
            ApiError::Unauthorized { .. } => 403,
            ApiError::Validation(_)
            | ApiError::StaleGraph { .. }
            | ApiError::TrustReplacementPending => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Storage(_)
            | ApiError::ContractViolation(_)
            | ApiError::Configuration(_)
            | ApiError::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry (possibly after reloading the graph).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::StaleGraph { .. } | ApiError::Storage(_))
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
