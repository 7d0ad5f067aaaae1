//! Repository error types.

use snip_domain::DomainError;
use snip_store::{RequestCharge, StoreError};
use thiserror::Error;

/// Errors surfaced by the snip repository.
///
/// Every adapter failure is classified into one of these kinds. Where the
/// adapter reported a charge before failing, it is kept so callers can still
/// account for partial cost.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    /// Document rejected (malformed, oversized, reserved property). Fix input; not retryable.
    #[error("Validation error: {reason}")]
    Validation {
        reason: String,
        charge: Option<RequestCharge>,
    },

    /// The specifically addressed document does not exist
    #[error("Snip not found: {id} for user {user_id}")]
    NotFound { id: String, user_id: String },

    /// Backend unavailable, timed out, or a page fetch failed. Safe to retry the whole call.
    #[error("Transient error: {reason}")]
    Transient {
        reason: String,
        charge: Option<RequestCharge>,
    },

    /// Collection or partition scheme misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Create a validation error with no charge
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            charge: None,
        }
    }

    /// Charge incurred before the failure, when known
    pub fn charge(&self) -> Option<RequestCharge> {
        match self {
            Self::Validation { charge, .. } | Self::Transient { charge, .. } => *charge,
            _ => None,
        }
    }

    /// Whether repeating the whole call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        RepositoryError::validation(err.to_string())
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                id, partition_key, ..
            } => RepositoryError::NotFound {
                id,
                user_id: partition_key,
            },
            StoreError::Conflict { reason, charge } => RepositoryError::Validation { reason, charge },
            StoreError::Serialization(reason) => RepositoryError::Validation {
                reason,
                charge: None,
            },
            StoreError::Unavailable { reason, charge } => RepositoryError::Transient { reason, charge },
            StoreError::Exhausted => RepositoryError::Transient {
                reason: StoreError::Exhausted.to_string(),
                charge: None,
            },
            StoreError::Configuration(reason) => RepositoryError::Configuration(reason),
        }
    }
}
