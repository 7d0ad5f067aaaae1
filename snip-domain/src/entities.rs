//! Domain Entities for SnipSnop
//!
//! A `Snip` is a bookmarked time range inside a podcast episode, owned by a
//! single user. It is stored as one document addressed by `(id, userId)`.

use crate::value_objects::{DomainError, Episode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a Snip (caller supplied)
pub type SnipId = String;

/// Identifier of the owning user; also the partition key
pub type UserId = String;

/// Property the store routes documents by
pub const PARTITION_KEY_FIELD: &str = "userId";

/// Partition key path configured on the snips collection
pub const PARTITION_KEY_PATH: &str = "/userId";

/// Generate a fresh snip id for callers creating a new snip.
///
/// The repository never generates ids itself.
pub fn new_snip_id() -> SnipId {
    Uuid::now_v7().to_string()
}

// =============================================================================
// Snip
// =============================================================================

/// One saved clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snip {
    /// Caller-supplied identifier, unique within the owner's partition
    pub id: SnipId,
    /// Owning user; also the partition key
    pub user_id: UserId,

    /// Clip start within the episode, opaque to the store
    pub start_time: String,
    /// Clip end within the episode, opaque to the store
    pub end_time: String,

    /// Stamped by the writer on every upsert
    pub last_modified: DateTime<Utc>,

    /// Reference to the out-of-band audio asset
    pub storage_key: String,

    /// Episode the clip was cut from, copied at creation time
    pub episode: Episode,
}

impl Snip {
    /// Create a new snip stamped with the current time
    pub fn new(
        id: impl Into<SnipId>,
        user_id: impl Into<UserId>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        storage_key: impl Into<String>,
        episode: Episode,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            last_modified: Utc::now(),
            storage_key: storage_key.into(),
            episode,
        }
    }

    /// Check the addressing invariants: both `id` and `userId` non-empty.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::MissingIdentifier("id"));
        }
        if self.user_id.is_empty() {
            return Err(DomainError::MissingIdentifier("userId"));
        }
        Ok(())
    }

    /// Partition key value of this document
    pub fn partition_key(&self) -> &str {
        &self.user_id
    }

    /// Compare every field except `last_modified`
    pub fn same_content(&self, other: &Snip) -> bool {
        self.id == other.id
            && self.user_id == other.user_id
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.storage_key == other.storage_key
            && self.episode == other.episode
    }

    /// Encode as a store document
    pub fn to_document(&self) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(self).map_err(|e| DomainError::InvalidDocument(e.to_string()))
    }

    /// Decode a store document.
    ///
    /// Unknown properties (store system metadata such as `_etag`) are ignored.
    pub fn from_document(document: serde_json::Value) -> Result<Self, DomainError> {
        serde_json::from_value(document).map_err(|e| DomainError::InvalidDocument(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
