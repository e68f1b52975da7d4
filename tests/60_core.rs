use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde_json::json;
use uuid::Uuid;

use crewbase_core::cache::CacheStore;
use crewbase_core::config::ConfigContext;
use crewbase_core::features::PlanTier;
use crewbase_core::numbering::NumberScope;
use crewbase_core::storage::MemoryStore;
use crewbase_core::TenantCore;

#[tokio::test]
async fn one_store_and_one_cache_drive_all_four_engines() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::in_process());
    let core = TenantCore::new(store.clone(), cache);

    let company = Uuid::new_v4();
    store.set_plan(company, PlanTier::Business).await;

    core.config
        .update_company_setting(company, "appearance", json!({"theme": "dark"}))
        .await
        .unwrap();
    core.features.set_flag(company, "custom_reports", true).await.unwrap();
    core.terminology.set_term(company, "job", "Project").await.unwrap();

    let resolved = core.config.resolve(&ConfigContext::company(company)).await;
    assert_eq!(resolved.value("appearance", "theme"), Some(&json!("dark")));

    assert!(core.features.is_enabled(company, "custom_reports").await);
    assert_eq!(core.terminology.term(company, "job").await, "Project");

    let number = core
        .numbering
        .next_number(company, "job", NumberScope::Company)
        .await
        .unwrap();
    assert_eq!(number, format!("JOB-{}-001", Utc::now().year()));
}

#[tokio::test]
async fn company_wide_invalidation_clears_every_engine_partition() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::in_process());
    let core = TenantCore::new(store.clone(), cache);

    let company = Uuid::new_v4();
    store.set_plan(company, PlanTier::Starter).await;

    // Warm every engine's cache.
    core.config.resolve(&ConfigContext::company(company)).await;
    core.features.flags(company).await;
    core.terminology.all_terminology(company).await;

    // Mutate the store underneath the caches, then blow the whole partition.
    store.set_plan(company, PlanTier::Business).await;
    core.cache.invalidate_company(company).await;

    // A fresh read sees the new plan without any engine-level clearing.
    assert!(core.features.is_enabled(company, "custom_reports").await == false);
    core.features.set_flag(company, "custom_reports", true).await.unwrap();
    assert!(core.features.is_enabled(company, "custom_reports").await);
}
