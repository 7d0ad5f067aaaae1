//! Behaviour of `SnipRepository` over the in-memory and scripted stores.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use snip_domain::Snip;
use snip_repository::{Config, FixedClock, RepositoryError, SnipRepository};
use snip_store::{DocumentStore, MemoryDocumentStore, Page, RequestCharge, StoreError};
use snip_testkit::{
    init_test_tracing, legacy_document, sample_snip, sample_time, ScriptedStore,
};

fn memory_repo(page_size: usize) -> (Arc<MemoryDocumentStore>, Arc<FixedClock>, SnipRepository) {
    init_test_tracing();
    let config = Config::test();
    let store = Arc::new(MemoryDocumentStore::new().with_page_size(page_size));
    store.create_collection(&config.collection, "/userId");
    let clock = Arc::new(FixedClock::new(sample_time()));
    let repo = SnipRepository::new(store.clone(), &config).with_clock(clock.clone());
    (store, clock, repo)
}

fn snip_page(ids: &[&str], user_id: &str, charge: f64) -> Page {
    Page {
        items: ids
            .iter()
            .map(|id| sample_snip(id, user_id).to_document().unwrap())
            .collect(),
        charge: RequestCharge::new(charge),
    }
}

fn ids(snips: &[Snip]) -> Vec<&str> {
    snips.iter().map(|s| s.id.as_str()).collect()
}

// =============================================================================
// Save
// =============================================================================

#[tokio::test]
async fn test_save_then_load_returns_saved_snip() {
    let (_, _, repo) = memory_repo(10);

    let (saved, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();
    let (snips, charge) = repo.load("u1").await.unwrap();

    assert_eq!(snips, vec![saved]);
    assert!(charge.units() > 0.0);
}

#[tokio::test]
async fn test_repeated_save_is_idempotent() {
    let (store, _, repo) = memory_repo(10);

    let (first, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();
    let (second, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();

    // Frozen clock: nothing observable changes
    assert_eq!(first, second);
    assert_eq!(store.document_count("snips"), 1);

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(snips, vec![second]);
}

#[tokio::test]
async fn test_repeated_save_only_moves_last_modified() {
    let (_, clock, repo) = memory_repo(10);

    let (first, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();
    clock.advance(Duration::seconds(30));
    let (second, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();

    assert!(second.last_modified > first.last_modified);
    assert!(first.same_content(&second));

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(snips.len(), 1);
    assert_eq!(snips[0].last_modified, second.last_modified);
}

#[tokio::test]
async fn test_save_replaces_whole_document() {
    let (_, _, repo) = memory_repo(10);
    repo.save(sample_snip("s1", "u1")).await.unwrap();

    let mut edited = sample_snip("s1", "u1");
    edited.start_time = "06:00".to_string();
    edited.episode.track_name = "Renamed".to_string();
    repo.save(edited).await.unwrap();

    let (snip, _) = repo.get("s1", "u1").await.unwrap();
    assert_eq!(snip.start_time, "06:00");
    assert_eq!(snip.episode.track_name, "Renamed");
}

#[tokio::test]
async fn test_save_then_get_round_trips_every_field() {
    let (_, clock, repo) = memory_repo(10);
    clock.advance(Duration::minutes(5));

    let input = sample_snip("s1", "u1");
    repo.save(input.clone()).await.unwrap();
    let (got, charge) = repo.get("s1", "u1").await.unwrap();

    assert!(got.same_content(&input));
    assert_eq!(got.last_modified, sample_time() + Duration::minutes(5));
    assert!(charge.units() > 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_leave_one_complete_document() {
    let (store, _, repo) = memory_repo(10);
    let repo = Arc::new(repo);

    let inputs: Vec<Snip> = (0..16)
        .map(|i| {
            let mut snip = sample_snip("s1", "u1");
            snip.start_time = format!("00:{:02}", i);
            snip.storage_key = format!("snips/u1/s1-{}.m4a", i);
            snip
        })
        .collect();

    let handles: Vec<_> = inputs
        .iter()
        .cloned()
        .map(|snip| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.save(snip).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.document_count("snips"), 1);
    let (stored, _) = repo.get("s1", "u1").await.unwrap();
    assert!(inputs.iter().any(|input| *input == stored));
}

#[tokio::test]
async fn test_oversized_snip_is_validation_error() {
    init_test_tracing();
    let config = Config::test();
    let store = Arc::new(MemoryDocumentStore::new().with_max_document_bytes(256));
    store.create_collection(&config.collection, "/userId");
    let repo = SnipRepository::new(store.clone(), &config);

    let mut snip = sample_snip("s1", "u1");
    snip.storage_key = "k".repeat(1024);

    let err = repo.save(snip).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.document_count("snips"), 0);
}

#[tokio::test]
async fn test_save_unavailable_is_transient() {
    let (store, _, repo) = memory_repo(10);
    store.fail_next(StoreError::unavailable("request timed out"));

    let err = repo.save(sample_snip("s1", "u1")).await.unwrap_err();
    assert!(err.is_retryable());

    // Retrying the whole call succeeds
    assert!(repo.save(sample_snip("s1", "u1")).await.is_ok());
}

// =============================================================================
// Load
// =============================================================================

#[tokio::test]
async fn test_load_is_partition_isolated() {
    let (_, _, repo) = memory_repo(2);
    for id in ["a", "b", "c"] {
        repo.save(sample_snip(id, "u1")).await.unwrap();
    }
    for id in ["x", "y"] {
        repo.save(sample_snip(id, "u2")).await.unwrap();
    }

    let (u1, _) = repo.load("u1").await.unwrap();
    let (u2, _) = repo.load("u2").await.unwrap();

    assert!(u1.iter().all(|s| s.user_id == "u1"));
    assert!(u2.iter().all(|s| s.user_id == "u2"));
    assert_eq!(u1.len(), 3);
    assert_eq!(u2.len(), 2);
}

#[tokio::test]
async fn test_load_drains_every_page() {
    let (_, _, repo) = memory_repo(2);
    for i in 0..7 {
        repo.save(sample_snip(&format!("s{}", i), "u1")).await.unwrap();
    }

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(snips.len(), 7);
}

#[tokio::test]
async fn test_load_sums_page_charges() {
    init_test_tracing();
    let store = Arc::new(ScriptedStore::new("snips", "/userId").with_pages([
        snip_page(&["a", "b"], "u1", 2.1),
        snip_page(&["c"], "u1", 3.4),
        snip_page(&["d"], "u1", 1.0),
    ]));
    let repo = SnipRepository::new(store.clone(), &Config::test());

    let (snips, charge) = repo.load("u1").await.unwrap();

    assert_eq!(ids(&snips), vec!["a", "b", "c", "d"]);
    assert!(charge.approx_eq(RequestCharge::new(6.5)));

    let queries = store.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].partition_key.as_deref(), Some("u1"));
    assert_eq!(queries[0].query.parameters(), vec![("@userId".to_string(), json!("u1"))]);
}

#[tokio::test]
async fn test_load_page_failure_returns_no_partial_list() {
    init_test_tracing();
    let store = Arc::new(
        ScriptedStore::new("snips", "/userId")
            .with_pages([
                snip_page(&["a", "b"], "u1", 2.0),
                snip_page(&["c"], "u1", 2.0),
            ])
            .failing_page(
                1,
                StoreError::Unavailable {
                    reason: "throttled".to_string(),
                    charge: Some(RequestCharge::new(0.5)),
                },
            ),
    );
    let repo = SnipRepository::new(store, &Config::test());

    let err = repo.load("u1").await.unwrap_err();

    assert!(matches!(err, RepositoryError::Transient { .. }));
    let charge = err.charge().unwrap();
    assert!(charge.approx_eq(RequestCharge::new(2.5)));
}

#[tokio::test]
async fn test_load_decode_failure_on_later_page_is_transient() {
    init_test_tracing();
    let store = Arc::new(
        ScriptedStore::new("snips", "/userId")
            .with_pages([
                snip_page(&["a"], "u1", 2.0),
                snip_page(&["b"], "u1", 2.0),
            ])
            .failing_page(1, StoreError::Serialization("column decode".to_string())),
    );
    let repo = SnipRepository::new(store, &Config::test());

    let err = repo.load("u1").await.unwrap_err();

    assert!(matches!(err, RepositoryError::Transient { .. }));
    assert!(err.is_retryable());
    assert!(err.charge().unwrap().approx_eq(RequestCharge::new(2.0)));
}

#[tokio::test]
async fn test_load_mid_drain_failure_on_memory_store() {
    let (store, _, repo) = memory_repo(2);
    for id in ["a", "b", "c", "d"] {
        repo.save(sample_snip(id, "u1")).await.unwrap();
    }
    store.fail_after(1, StoreError::unavailable("connection reset"));

    let err = repo.load("u1").await.unwrap_err();
    assert!(err.is_retryable());

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(snips.len(), 4);
}

#[tokio::test]
async fn test_load_legacy_document_is_validation_error() {
    let (store, _, repo) = memory_repo(10);
    store
        .upsert_document("snips", legacy_document("old", "u1"), "u1")
        .await
        .unwrap();

    let err = repo.load("u1").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
    assert!(err.charge().is_some());
}

#[tokio::test]
async fn test_load_all_is_cross_partition() {
    init_test_tracing();
    let store = Arc::new(ScriptedStore::new("snips", "/userId").with_pages([
        snip_page(&["a"], "u1", 1.0),
        snip_page(&["b"], "u2", 1.0),
    ]));
    let repo = SnipRepository::new(store.clone(), &Config::test());

    let (snips, charge) = repo.load_all().await.unwrap();

    assert_eq!(snips.len(), 2);
    assert!(charge.approx_eq(RequestCharge::new(2.0)));
    assert_eq!(store.queries()[0].partition_key, None);
    assert!(store.queries()[0].query.parameters().is_empty());
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_then_load_omits_snip() {
    let (_, _, repo) = memory_repo(10);
    repo.save(sample_snip("s1", "u1")).await.unwrap();
    repo.save(sample_snip("s2", "u1")).await.unwrap();

    let charge = repo.delete("s1", "u1").await.unwrap();
    assert!(charge.units() > 0.0);

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(ids(&snips), vec!["s2"]);
}

#[tokio::test]
async fn test_delete_absent_is_not_found() {
    let (_, _, repo) = memory_repo(10);

    let err = repo.delete("ghost", "u1").await.unwrap_err();
    assert_eq!(
        err,
        RepositoryError::NotFound {
            id: "ghost".to_string(),
            user_id: "u1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_delete_is_scoped_to_partition() {
    let (_, _, repo) = memory_repo(10);
    repo.save(sample_snip("s1", "u1")).await.unwrap();

    let err = repo.delete("s1", "u2").await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
    assert!(repo.get("s1", "u1").await.is_ok());
}

#[tokio::test]
async fn test_point_operations_report_store_charge() {
    init_test_tracing();
    let store = Arc::new(ScriptedStore::new("snips", "/userId").with_write_charge(7.25));
    let repo = SnipRepository::new(store, &Config::test());

    let (_, charge) = repo.save(sample_snip("s1", "u1")).await.unwrap();
    assert_eq!(charge, RequestCharge::new(7.25));

    let charge = repo.delete("s1", "u1").await.unwrap();
    assert_eq!(charge, RequestCharge::new(7.25));
}

#[tokio::test]
async fn test_point_operation_failures_are_classified() {
    init_test_tracing();
    let throttled = Arc::new(
        ScriptedStore::new("snips", "/userId")
            .failing_point_ops(StoreError::unavailable("throttled")),
    );
    let repo = SnipRepository::new(throttled, &Config::test());

    assert!(repo.save(sample_snip("s1", "u1")).await.unwrap_err().is_retryable());
    assert!(repo.delete("s1", "u1").await.unwrap_err().is_retryable());
    assert!(repo.get("s1", "u1").await.unwrap_err().is_retryable());

    let rejected = Arc::new(
        ScriptedStore::new("snips", "/userId").failing_point_ops(StoreError::Conflict {
            reason: "reserved property".to_string(),
            charge: Some(RequestCharge::new(1.0)),
        }),
    );
    let repo = SnipRepository::new(rejected, &Config::test());

    let err = repo.save(sample_snip("s1", "u1")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
    assert_eq!(err.charge(), Some(RequestCharge::new(1.0)));
}

// =============================================================================
// Scenario
// =============================================================================

#[tokio::test]
async fn test_single_user_lifecycle() {
    let (_, _, repo) = memory_repo(10);

    let (saved, _) = repo.save(sample_snip("s1", "u1")).await.unwrap();
    assert_eq!(saved.last_modified, sample_time());

    let (snips, _) = repo.load("u1").await.unwrap();
    assert_eq!(snips.len(), 1);
    assert_eq!(snips[0].episode.track_name, "1066: The Battle of Hastings");

    repo.delete("s1", "u1").await.unwrap();
    let (snips, _) = repo.load("u1").await.unwrap();
    assert!(snips.is_empty());
}

#[tokio::test]
async fn test_configuration_errors_surface() {
    init_test_tracing();
    let store = Arc::new(MemoryDocumentStore::new());
    let repo = SnipRepository::new(store, &Config::test());

    let err = repo.load("u1").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Configuration(_)));
    assert!(!err.is_retryable());
}
