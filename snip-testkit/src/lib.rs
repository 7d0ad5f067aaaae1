//! Test helpers for snip persistence tests.
//!
//! Provides sample snips, a scripted document store with exact page charges
//! and injectable failures, and tracing setup for test output.

mod fixtures;
mod scripted;

pub use fixtures::{legacy_document, sample_episode, sample_snip, sample_time};
pub use scripted::{RecordedQuery, ScriptedStore};

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Result type for test helpers.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test writer.
///
/// Honours `RUST_LOG`, defaulting to debug output for the snip crates. Safe
/// to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,snip_store=debug,snip_repository=debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer().compact())
            .try_init();
    });
}
