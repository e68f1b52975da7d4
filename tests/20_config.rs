use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crewbase_core::cache::CacheStore;
use crewbase_core::config::{ConfigContext, ConfigError, ConfigResolver};
use crewbase_core::storage::MemoryStore;

fn resolver() -> (Arc<MemoryStore>, ConfigResolver) {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::in_process());
    let resolver = ConfigResolver::new(store.clone(), cache);
    (store, resolver)
}

#[tokio::test]
async fn platform_defaults_are_the_floor() {
    let (_store, resolver) = resolver();
    let ctx = ConfigContext::company(Uuid::new_v4());

    let resolved = resolver.resolve(&ctx).await;
    assert_eq!(resolved.value("appearance", "theme"), Some(&json!("light")));
    assert_eq!(resolved.value("general", "currency"), Some(&json!("USD")));
}

#[tokio::test]
async fn most_specific_level_wins_per_field() {
    let (store, resolver) = resolver();
    let company = Uuid::new_v4();
    let project = Uuid::new_v4();
    let user = Uuid::new_v4();

    resolver
        .update_company_setting(company, "appearance", json!({"density": "compact"}))
        .await
        .unwrap();
    store
        .put_project_override(company, project, "appearance", json!({"accent_color": "#b91c1c"}))
        .await;
    store
        .put_user_override(company, user, "appearance", json!({"theme": "dark"}))
        .await;

    let ctx = ConfigContext::company(company).with_project(project).with_user(user);
    let resolved = resolver.resolve(&ctx).await;

    // Each field comes from the most specific level that sets it; siblings
    // set lower down survive.
    assert_eq!(resolved.value("appearance", "theme"), Some(&json!("dark")));
    assert_eq!(resolved.value("appearance", "density"), Some(&json!("compact")));
    assert_eq!(resolved.value("appearance", "accent_color"), Some(&json!("#b91c1c")));
    assert_eq!(resolved.value("appearance", "sidebar_collapsed"), Some(&json!(false)));
}

#[tokio::test]
async fn company_level_applies_without_project_or_user_context() {
    let (_store, resolver) = resolver();
    let company = Uuid::new_v4();

    resolver
        .update_company_setting(company, "estimating", json!({"default_markup_pct": 22.5}))
        .await
        .unwrap();

    let resolved = resolver.resolve(&ConfigContext::company(company)).await;
    assert_eq!(resolved.value("estimating", "default_markup_pct"), Some(&json!(22.5)));
    // Untouched sibling stays at the platform default.
    assert_eq!(resolved.value("estimating", "labor_burden_pct"), Some(&json!(20.0)));
}

#[tokio::test]
async fn write_then_read_reflects_the_new_value() {
    let (_store, resolver) = resolver();
    let company = Uuid::new_v4();
    let ctx = ConfigContext::company(company);

    // Populate the cache with the pre-write resolution.
    let before = resolver.resolve(&ctx).await;
    assert_eq!(before.value("appearance", "theme"), Some(&json!("light")));

    resolver
        .update_company_setting(company, "appearance", json!({"theme": "dark"}))
        .await
        .unwrap();

    let after = resolver.resolve(&ctx).await;
    assert_eq!(after.value("appearance", "theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn company_write_does_not_disturb_another_company() {
    let (_store, resolver) = resolver();
    let company_a = Uuid::new_v4();
    let company_b = Uuid::new_v4();

    resolver
        .update_company_setting(company_b, "appearance", json!({"theme": "dark"}))
        .await
        .unwrap();

    // Warm company A's cache, then write to B again; A's entry must survive
    // untouched and still resolve correctly.
    let a_before = resolver.resolve(&ConfigContext::company(company_a)).await;
    resolver
        .update_company_setting(company_b, "appearance", json!({"theme": "light"}))
        .await
        .unwrap();
    let a_after = resolver.resolve(&ConfigContext::company(company_a)).await;

    assert_eq!(a_before, a_after);
}

#[tokio::test]
async fn unknown_section_writes_are_rejected() {
    let (_store, resolver) = resolver();
    let result = resolver
        .update_company_setting(Uuid::new_v4(), "no_such_section", json!({"x": 1}))
        .await;
    assert!(matches!(result, Err(ConfigError::UnknownSection(_))));
}

#[tokio::test]
async fn bulk_update_applies_every_section() -> anyhow::Result<()> {
    let (_store, resolver) = resolver();
    let company = Uuid::new_v4();

    let patch = BTreeMap::from([
        ("appearance".to_string(), json!({"theme": "dark"})),
        ("notifications".to_string(), json!({"sms_enabled": true})),
    ]);
    resolver.update_company_settings(company, patch).await?;

    let settings = resolver.company_settings(company).await?;
    assert_eq!(settings.value("appearance", "theme"), Some(&json!("dark")));
    assert_eq!(settings.value("notifications", "sms_enabled"), Some(&json!(true)));
    assert_eq!(settings.value("notifications", "email_enabled"), Some(&json!(true)));
    Ok(())
}

#[tokio::test]
async fn storage_fault_degrades_to_platform_defaults() {
    let (store, resolver) = resolver();
    let company = Uuid::new_v4();

    resolver
        .update_company_setting(company, "appearance", json!({"theme": "dark"}))
        .await
        .unwrap();

    store.set_fail_reads(true).await;
    let resolved = resolver.resolve(&ConfigContext::company(company)).await;

    // The company level could not be fetched; the platform floor answers.
    assert_eq!(resolved.value("appearance", "theme"), Some(&json!("light")));
}

#[tokio::test]
async fn reset_reverts_a_section_to_the_floor() {
    let (_store, resolver) = resolver();
    let company = Uuid::new_v4();

    resolver
        .update_company_setting(company, "scheduling", json!({"show_weekends": true}))
        .await
        .unwrap();
    resolver.reset_company_setting(company, "scheduling").await.unwrap();

    let resolved = resolver.resolve(&ConfigContext::company(company)).await;
    assert_eq!(resolved.value("scheduling", "show_weekends"), Some(&json!(false)));
}

#[tokio::test]
async fn resolve_section_and_get_value_extract_from_the_merge() {
    let (_store, resolver) = resolver();
    let company = Uuid::new_v4();
    let ctx = ConfigContext::company(company);

    resolver
        .update_company_setting(company, "documents", json!({"max_upload_mb": 100}))
        .await
        .unwrap();

    let section = resolver.resolve_section(&ctx, "documents").await;
    assert_eq!(section.get("max_upload_mb"), Some(&json!(100)));
    assert_eq!(section.get("retention_years"), Some(&json!(7)));

    let value = resolver.get_value(&ctx, "documents", "max_upload_mb").await;
    assert_eq!(value, Some(json!(100)));

    // Unknown sections resolve empty rather than failing a render path.
    let missing = resolver.resolve_section(&ctx, "no_such_section").await;
    assert_eq!(missing, json!({}));
}
