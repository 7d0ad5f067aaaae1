//! Storage adapter errors

use crate::charge::RequestCharge;
use thiserror::Error;

/// Errors raised by a document store adapter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No document at the given id + partition key
    #[error("Document not found: {id} in partition {partition_key} of {collection}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
        /// Partition key value
        partition_key: String,
    },

    /// The store rejected the write (schema, size limit, reserved property)
    #[error("Write rejected: {reason}")]
    Conflict {
        /// Why the store refused the document
        reason: String,
        /// Charge incurred before the rejection, if reported
        charge: Option<RequestCharge>,
    },

    /// Transient backend failure (connection, timeout, throttling)
    #[error("Store unavailable: {reason}")]
    Unavailable {
        /// Backend failure description
        reason: String,
        /// Charge incurred before the failure, if reported
        charge: Option<RequestCharge>,
    },

    /// `next_page` called on an iterator with no pages left
    #[error("Page iterator exhausted")]
    Exhausted,

    /// Collection or partition scheme misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(
        collection: impl Into<String>,
        id: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
            partition_key: partition_key.into(),
        }
    }

    /// Create a conflict error with no charge
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
            charge: None,
        }
    }

    /// Create an unavailable error with no charge
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            charge: None,
        }
    }

    /// Charge carried by the error, if any
    pub fn charge(&self) -> Option<RequestCharge> {
        match self {
            Self::Conflict { charge, .. } | Self::Unavailable { charge, .. } => *charge,
            _ => None,
        }
    }

    /// Fold an earlier charge into the error.
    ///
    /// Variants without a charge slot are returned unchanged.
    pub fn with_prior_charge(self, prior: RequestCharge) -> Self {
        match self {
            Self::Conflict { reason, charge } => Self::Conflict {
                reason,
                charge: Some(charge.unwrap_or_default() + prior),
            },
            Self::Unavailable { reason, charge } => Self::Unavailable {
                reason,
                charge: Some(charge.unwrap_or_default() + prior),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                match code.as_str() {
                    // undefined_table, undefined_column
                    "42P01" | "42703" => StoreError::Configuration(db_err.to_string()),
                    // data exceptions, integrity violations, program limits
                    c if c.starts_with("22") || c.starts_with("23") || c.starts_with("54") => {
                        StoreError::conflict(db_err.to_string())
                    },
                    _ => StoreError::unavailable(db_err.to_string()),
                }
            },
            sqlx::Error::Configuration(e) => StoreError::Configuration(e.to_string()),
            sqlx::Error::Decode(e) | sqlx::Error::ColumnDecode { source: e, .. } => {
                StoreError::Serialization(e.to_string())
            },
            _ => StoreError::unavailable(err.to_string()),
        }
    }
}
