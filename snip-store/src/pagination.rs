//! Page draining and snapshot page iteration.

use crate::charge::RequestCharge;
use crate::error::StoreError;
use crate::ports::{Page, PageIterator};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

// =============================================================================
// Drain
// =============================================================================

/// Every item of a fully drained query and its total charge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drained {
    /// Items from all pages, in page order
    pub items: Vec<Value>,
    /// Sum of every page charge
    pub charge: RequestCharge,
    /// Number of pages fetched
    pub pages: usize,
}

/// Consume a page iterator in a single pass.
///
/// Items and page charges are accumulated until `has_more` turns false. A
/// failed fetch aborts the drain: accumulated items are dropped and the error
/// carries the charge observed so far. Every fetch failure other than
/// `Configuration` is reported as `Unavailable`, since the query as a whole
/// can be repeated.
pub async fn drain(mut pages: Box<dyn PageIterator>) -> Result<Drained, StoreError> {
    let mut drained = Drained::default();

    while pages.has_more() {
        let page = match pages.next_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    pages = drained.pages,
                    charge = %drained.charge,
                    error = %e,
                    "Page fetch failed, discarding partial results"
                );
                return Err(page_failure(e, drained.charge));
            },
        };

        drained.pages += 1;
        drained.charge += page.charge;
        debug!(
            page = drained.pages,
            items = page.items.len(),
            charge = %page.charge,
            "Fetched page"
        );
        drained.items.extend(page.items);
    }

    Ok(drained)
}

/// Classify a failed page fetch, folding in the charge of earlier pages
fn page_failure(error: StoreError, prior: RequestCharge) -> StoreError {
    match error {
        StoreError::Configuration(_) => error,
        StoreError::Unavailable { .. } => error.with_prior_charge(prior),
        other => StoreError::Unavailable {
            charge: Some(other.charge().unwrap_or_default() + prior),
            reason: other.to_string(),
        },
    }
}

// =============================================================================
// Snapshot Pages
// =============================================================================

/// Page iterator over pages materialized up front.
///
/// Used by stores that evaluate the whole query at once.
pub struct SnapshotPages {
    pages: VecDeque<Page>,
}

impl SnapshotPages {
    /// Build from ready-made pages
    pub fn new(pages: impl IntoIterator<Item = Page>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    /// Split `items` into pages of at most `page_size`, charging each page
    /// with `charge_for(&items_in_page)`.
    ///
    /// An empty result still yields one empty page, as a real store round trip would.
    pub fn chunked(
        items: Vec<Value>,
        page_size: usize,
        charge_for: impl Fn(&[Value]) -> RequestCharge,
    ) -> Self {
        let page_size = page_size.max(1);
        if items.is_empty() {
            return Self::new([Page {
                items: Vec::new(),
                charge: charge_for(&[]),
            }]);
        }

        let pages = items
            .chunks(page_size)
            .map(|chunk| Page {
                charge: charge_for(chunk),
                items: chunk.to_vec(),
            })
            .collect::<Vec<_>>();
        Self::new(pages)
    }

    /// Pages not yet fetched
    pub fn remaining(&self) -> usize {
        self.pages.len()
    }
}

#[async_trait]
impl PageIterator for SnapshotPages {
    fn has_more(&self) -> bool {
        !self.pages.is_empty()
    }

    async fn next_page(&mut self) -> Result<Page, StoreError> {
        self.pages.pop_front().ok_or(StoreError::Exhausted)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: &[&str], charge: f64) -> Page {
        Page {
            items: ids.iter().map(|id| json!({ "id": id })).collect(),
            charge: RequestCharge::new(charge),
        }
    }

    /// Yields pages, then fails on the configured fetch
    struct FailingPages {
        inner: SnapshotPages,
        fail_at: usize,
        fetched: usize,
        error: StoreError,
    }

    fn failing(pages: SnapshotPages, fail_at: usize, error: StoreError) -> FailingPages {
        FailingPages {
            inner: pages,
            fail_at,
            fetched: 0,
            error,
        }
    }

    #[async_trait]
    impl PageIterator for FailingPages {
        fn has_more(&self) -> bool {
            self.inner.has_more()
        }

        async fn next_page(&mut self) -> Result<Page, StoreError> {
            self.fetched += 1;
            if self.fetched == self.fail_at {
                return Err(self.error.clone());
            }
            self.inner.next_page().await
        }
    }

    #[tokio::test]
    async fn test_drain_sums_page_charges() {
        let pages = SnapshotPages::new([
            page(&["a", "b"], 2.1),
            page(&["c"], 3.4),
            page(&["d"], 1.0),
        ]);

        let drained = drain(Box::new(pages)).await.unwrap();

        assert_eq!(drained.items.len(), 4);
        assert_eq!(drained.pages, 3);
        assert!(drained.charge.approx_eq(RequestCharge::new(6.5)));
        assert_eq!(drained.items[2]["id"], "c");
    }

    #[tokio::test]
    async fn test_drain_failure_carries_charge_so_far() {
        let pages = failing(
            SnapshotPages::new([page(&["a"], 2.0), page(&["b"], 3.0), page(&["c"], 4.0)]),
            2,
            StoreError::Unavailable {
                reason: "connection reset".to_string(),
                charge: Some(RequestCharge::new(0.5)),
            },
        );

        let err = drain(Box::new(pages)).await.unwrap_err();

        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(err.charge(), Some(RequestCharge::new(2.5)));
    }

    #[tokio::test]
    async fn test_drain_decode_failure_becomes_unavailable() {
        let pages = failing(
            SnapshotPages::new([page(&["a"], 2.0), page(&["b"], 2.0)]),
            2,
            StoreError::Serialization("column decode".to_string()),
        );

        let err = drain(Box::new(pages)).await.unwrap_err();

        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(err.charge(), Some(RequestCharge::new(2.0)));
        assert!(err.to_string().contains("column decode"));
    }

    #[tokio::test]
    async fn test_drain_keeps_configuration_errors() {
        let pages = failing(
            SnapshotPages::new([page(&["a"], 2.0), page(&["b"], 2.0)]),
            2,
            StoreError::Configuration("collection dropped".to_string()),
        );

        let err = drain(Box::new(pages)).await.unwrap_err();
        assert_eq!(err, StoreError::Configuration("collection dropped".to_string()));
    }

    #[tokio::test]
    async fn test_snapshot_pages_exhausted() {
        let mut pages = SnapshotPages::new([page(&["a"], 1.0)]);

        assert!(pages.has_more());
        pages.next_page().await.unwrap();
        assert!(!pages.has_more());
        assert_eq!(pages.next_page().await, Err(StoreError::Exhausted));
    }

    #[tokio::test]
    async fn test_chunked_splits_and_charges() {
        let items = (0..5).map(|i| json!({ "id": i })).collect();
        let pages = SnapshotPages::chunked(items, 2, |chunk| RequestCharge::new(chunk.len() as f64));

        assert_eq!(pages.remaining(), 3);
        let drained = drain(Box::new(pages)).await.unwrap();
        assert_eq!(drained.items.len(), 5);
        assert_eq!(drained.charge, RequestCharge::new(5.0));
    }

    #[tokio::test]
    async fn test_chunked_empty_yields_one_page() {
        let pages = SnapshotPages::chunked(Vec::new(), 10, |_| RequestCharge::new(2.0));

        assert_eq!(pages.remaining(), 1);
        let drained = drain(Box::new(pages)).await.unwrap();
        assert!(drained.items.is_empty());
        assert_eq!(drained.charge, RequestCharge::new(2.0));
    }
}
