//! SnipSnop Domain Layer
//!
//! Pure data definitions for saved podcast clips ("snips") with zero I/O
//! dependencies. The serialized field names double as the physical property
//! names in the document store and must stay stable.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{new_snip_id, Snip, SnipId, UserId, PARTITION_KEY_FIELD, PARTITION_KEY_PATH};
pub use value_objects::{DomainError, Episode};
