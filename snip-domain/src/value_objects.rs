//! Value Objects for SnipSnop
//!
//! Immutable values without identity, plus the domain error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Errors raised by domain validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A required identifier was empty
    #[error("Missing identifier: {0} must not be empty")]
    MissingIdentifier(&'static str),

    /// The document could not be decoded as a snip
    #[error("Invalid snip document: {0}")]
    InvalidDocument(String),
}

// =============================================================================
// Episode
// =============================================================================

/// Denormalized copy of the podcast episode a snip was cut from.
///
/// Captured when the snip is created and embedded in the snip document.
/// Later changes to the catalog entry never rewrite existing snips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// External catalog id of the track
    pub track_id: i64,
    /// Audio URL of the episode
    pub episode_url: String,
    /// Episode title
    pub track_name: String,
    /// Podcast (collection) title
    pub collection_name: String,
    /// Cover art URL
    pub artwork_url: String,
}

impl Episode {
    /// Create a new episode value
    pub fn new(
        track_id: i64,
        episode_url: impl Into<String>,
        track_name: impl Into<String>,
        collection_name: impl Into<String>,
        artwork_url: impl Into<String>,
    ) -> Self {
        Self {
            track_id,
            episode_url: episode_url.into(),
            track_name: track_name.into(),
            collection_name: collection_name.into(),
            artwork_url: artwork_url.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
