use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crewbase_core::cache::CacheStore;
use crewbase_core::storage::MemoryStore;
use crewbase_core::terminology::{TerminologyEngine, TerminologyError, DEFAULT_TERMINOLOGY};

fn engine() -> (Arc<MemoryStore>, TerminologyEngine) {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::in_process());
    let engine = TerminologyEngine::new(store.clone(), cache);
    (store, engine)
}

#[tokio::test]
async fn defaults_resolve_without_overrides() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    assert_eq!(engine.term(company, "job").await, "Job");
    assert_eq!(engine.term_plural(company, "job").await, "Jobs");
    assert_eq!(engine.term_plural(company, "warranty").await, "Warranties");
}

#[tokio::test]
async fn company_overrides_win_and_pluralize() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    engine.set_term(company, "job", "Project").await.unwrap();

    assert_eq!(engine.term(company, "job").await, "Project");
    assert_eq!(engine.term_plural(company, "job").await, "Projects");
}

#[tokio::test]
async fn unknown_terms_fall_back_to_the_key() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    assert_eq!(engine.term(company, "unknown_term").await, "unknown_term");
    assert_eq!(engine.term_plural(company, "unknown_term").await, "unknown_term");
}

#[tokio::test]
async fn unknown_term_writes_are_rejected() {
    let (_store, engine) = engine();
    let result = engine.set_term(Uuid::new_v4(), "unknown_term", "Whatever").await;
    assert!(matches!(result, Err(TerminologyError::UnknownTerm(_))));
}

#[tokio::test]
async fn overrides_are_isolated_per_company() {
    let (_store, engine) = engine();
    let company_a = Uuid::new_v4();
    let company_b = Uuid::new_v4();

    engine.set_term(company_a, "client", "Homeowner").await.unwrap();

    assert_eq!(engine.term(company_a, "client").await, "Homeowner");
    assert_eq!(engine.term(company_b, "client").await, "Client");
}

#[tokio::test]
async fn bulk_set_and_batched_lookup() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    engine
        .set_terms(
            company,
            &BTreeMap::from([
                ("job".to_string(), "Project".to_string()),
                ("vendor".to_string(), "Supplier".to_string()),
            ]),
        )
        .await
        .unwrap();

    let terms = engine.terms(company, &["job", "vendor", "client"]).await;
    assert_eq!(terms.get("job"), Some(&"Project".to_string()));
    assert_eq!(terms.get("vendor"), Some(&"Supplier".to_string()));
    assert_eq!(terms.get("client"), Some(&"Client".to_string()));
}

#[tokio::test]
async fn all_terminology_covers_the_whole_catalog() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    engine.set_term(company, "job", "Project").await.unwrap();
    let all = engine.all_terminology(company).await;

    assert_eq!(all.len(), DEFAULT_TERMINOLOGY.len());
    assert_eq!(all.get("job"), Some(&"Project".to_string()));
    assert_eq!(all.get("invoice"), Some(&"Invoice".to_string()));
}

#[tokio::test]
async fn reset_reverts_one_term_or_all() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    engine.set_term(company, "job", "Project").await.unwrap();
    engine.set_term(company, "client", "Homeowner").await.unwrap();

    engine.reset(company, Some("job")).await.unwrap();
    assert_eq!(engine.term(company, "job").await, "Job");
    assert_eq!(engine.term(company, "client").await, "Homeowner");

    engine.reset(company, None).await.unwrap();
    assert_eq!(engine.term(company, "client").await, "Client");
}

#[tokio::test]
async fn helper_is_a_bound_snapshot() {
    let (_store, engine) = engine();
    let company = Uuid::new_v4();

    engine.set_term(company, "job", "Project").await.unwrap();
    let helper = engine.helper(company).await;

    assert_eq!(helper.term("job"), "Project");
    assert_eq!(helper.term_plural("job"), "Projects");
    assert_eq!(helper.term("client"), "Client");
    assert_eq!(helper.term("unknown_term"), "unknown_term");
}

#[tokio::test]
async fn storage_fault_degrades_to_defaults() {
    let (store, engine) = engine();
    let company = Uuid::new_v4();

    engine.set_term(company, "job", "Project").await.unwrap();
    store.set_fail_reads(true).await;

    assert_eq!(engine.term(company, "job").await, "Job");
}
