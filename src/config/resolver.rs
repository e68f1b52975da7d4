use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CacheKey, CachePrefix, CacheStore, CacheTtl};
use crate::storage::{ConfigRepository, StorageError, TenantConfigRow};

use super::defaults;

/// Who is asking. Resolution uses every level the context carries:
/// platform always, company always, project and user when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub company_id: Uuid,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ConfigContext {
    pub fn company(company_id: Uuid) -> Self {
        Self { company_id, project_id: None, user_id: None }
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// The merged settings namespace: section name -> field map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub sections: BTreeMap<String, Value>,
}

impl ResolvedConfig {
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.get(key)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown settings section: {0}")]
    UnknownSection(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Deep value equality, used to detect no-op writes.
pub fn config_equals(a: &Value, b: &Value) -> bool {
    a == b
}

/// Four-level settings resolution: Platform -> Company -> Project -> User,
/// most specific level winning per field. Backed by the cache store as a
/// read-through layer; a fetch fault at any overridable level degrades that
/// level to empty rather than failing the request.
pub struct ConfigResolver {
    repo: Arc<dyn ConfigRepository>,
    cache: Arc<CacheStore>,
}

impl ConfigResolver {
    pub fn new(repo: Arc<dyn ConfigRepository>, cache: Arc<CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// Resolve the full settings namespace for a context.
    pub async fn resolve(&self, ctx: &ConfigContext) -> ResolvedConfig {
        let key = Self::resolved_key(ctx);
        if let Some(hit) = self.cache.get::<ResolvedConfig>(&key).await {
            return hit;
        }
        let resolved = self.resolve_uncached(ctx).await;
        self.cache.set(&key, &resolved, CacheTtl::Medium).await;
        resolved
    }

    /// One section of the namespace. Unknown sections resolve to an empty
    /// object rather than an error so render paths never break on a typo.
    pub async fn resolve_section(&self, ctx: &ConfigContext, section: &str) -> Value {
        match self.resolve(ctx).await.sections.remove(section) {
            Some(value) => value,
            None => {
                tracing::warn!(section, "unknown settings section, resolving empty");
                Value::Object(Default::default())
            }
        }
    }

    /// One field of one section, from the most specific level that sets it.
    pub async fn get_value(&self, ctx: &ConfigContext, section: &str, key: &str) -> Option<Value> {
        self.resolve(ctx).await.value(section, key).cloned()
    }

    pub fn platform_default(section: &str, key: &str) -> Option<&'static Value> {
        defaults::platform_default(section, key)
    }

    pub fn platform_section(section: &str) -> Option<&'static Value> {
        defaults::platform_section(section)
    }

    async fn resolve_uncached(&self, ctx: &ConfigContext) -> ResolvedConfig {
        let mut sections: BTreeMap<String, Value> = defaults::PLATFORM_DEFAULTS
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();

        let company_rows = self
            .level_rows("company", self.repo.company_overrides(ctx.company_id).await);
        merge_rows(&mut sections, company_rows);

        if let Some(project_id) = ctx.project_id {
            let rows = self.level_rows(
                "project",
                self.repo.project_overrides(ctx.company_id, project_id).await,
            );
            merge_rows(&mut sections, rows);
        }

        if let Some(user_id) = ctx.user_id {
            let rows = self.level_rows(
                "user",
                self.repo.user_overrides(ctx.company_id, user_id).await,
            );
            merge_rows(&mut sections, rows);
        }

        ResolvedConfig { sections }
    }

    /// A level that cannot be fetched contributes nothing; resolution falls
    /// through to the less specific levels.
    fn level_rows(
        &self,
        level: &str,
        fetched: Result<Vec<TenantConfigRow>, StorageError>,
    ) -> Vec<TenantConfigRow> {
        match fetched {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(level, error = %e, "settings level fetch failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Company-level view only (platform defaults plus company overrides),
    /// for settings UI that never touches the deeper levels.
    pub async fn company_settings(&self, company_id: Uuid) -> Result<ResolvedConfig, ConfigError> {
        let mut sections: BTreeMap<String, Value> = defaults::PLATFORM_DEFAULTS
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        merge_rows(&mut sections, self.repo.company_overrides(company_id).await?);
        Ok(ResolvedConfig { sections })
    }

    /// Write one company-level section override. A value deep-equal to the
    /// stored override is a no-op: no write, no invalidation.
    pub async fn update_company_setting(
        &self,
        company_id: Uuid,
        section: &str,
        value: Value,
    ) -> Result<(), ConfigError> {
        if defaults::platform_section(section).is_none() {
            return Err(ConfigError::UnknownSection(section.to_string()));
        }

        if let Some(existing) = self.repo.company_override(company_id, section).await? {
            if config_equals(&existing.value, &value) {
                tracing::debug!(company_id = %company_id, section, "unchanged setting, skipping write");
                return Ok(());
            }
        }

        self.repo.upsert_company_override(company_id, section, &value).await?;
        // Durable write first, then invalidation, so a concurrent reader
        // cannot repopulate the cache with the pre-write value.
        self.invalidate(company_id).await;
        Ok(())
    }

    /// Write several section overrides, invalidating once at the end.
    pub async fn update_company_settings(
        &self,
        company_id: Uuid,
        patch: BTreeMap<String, Value>,
    ) -> Result<(), ConfigError> {
        for section in patch.keys() {
            if defaults::platform_section(section).is_none() {
                return Err(ConfigError::UnknownSection(section.clone()));
            }
        }

        let mut wrote = false;
        for (section, value) in patch {
            if let Some(existing) = self.repo.company_override(company_id, &section).await? {
                if config_equals(&existing.value, &value) {
                    continue;
                }
            }
            self.repo.upsert_company_override(company_id, &section, &value).await?;
            wrote = true;
        }
        if wrote {
            self.invalidate(company_id).await;
        }
        Ok(())
    }

    /// Remove a company-level override entirely, reverting the section to
    /// the platform floor.
    pub async fn reset_company_setting(
        &self,
        company_id: Uuid,
        section: &str,
    ) -> Result<(), ConfigError> {
        self.repo.delete_company_override(company_id, section).await?;
        self.invalidate(company_id).await;
        Ok(())
    }

    /// Explicit invalidation hook: one company's config partition, or every
    /// company's when no id is given.
    pub async fn clear_cache(&self, company_id: Option<Uuid>) {
        match company_id {
            Some(company_id) => self.invalidate(company_id).await,
            None => self.cache.invalidate_pattern("settings:*:config:*").await,
        }
    }

    /// Any company-level write may affect every cached resolution involving
    /// that company (project- and user-scoped entries included), so the
    /// whole partition goes.
    async fn invalidate(&self, company_id: Uuid) {
        self.cache
            .invalidate_pattern(&format!("settings:{}:config:*", company_id))
            .await;
    }

    fn resolved_key(ctx: &ConfigContext) -> CacheKey {
        let project = ctx.project_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        let user = ctx.user_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        CacheKey::tenant(
            CachePrefix::Settings,
            ctx.company_id,
            &["config", "resolved", &project, &user],
        )
    }
}

/// Shallow field-level merge, one level deep: the override contributes only
/// the fields it sets; a field value that is itself an object replaces
/// wholesale. A non-object override replaces the whole section.
fn merge_section(sections: &mut BTreeMap<String, Value>, section: String, overrides: Value) {
    let Value::Object(override_fields) = overrides else {
        sections.insert(section, overrides);
        return;
    };
    match sections.get_mut(&section) {
        Some(Value::Object(fields)) => {
            for (field, value) in override_fields {
                fields.insert(field, value);
            }
        }
        _ => {
            sections.insert(section, Value::Object(override_fields));
        }
    }
}

fn merge_rows(sections: &mut BTreeMap<String, Value>, rows: Vec<TenantConfigRow>) {
    for row in rows {
        merge_section(sections, row.key, row.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_untouched_sibling_fields() {
        let mut sections = BTreeMap::from([(
            "appearance".to_string(),
            json!({"theme": "light", "density": "normal"}),
        )]);
        merge_section(&mut sections, "appearance".to_string(), json!({"density": "compact"}));

        assert_eq!(
            sections["appearance"],
            json!({"theme": "light", "density": "compact"})
        );
    }

    #[test]
    fn merge_replaces_nested_objects_wholesale() {
        let mut sections = BTreeMap::from([(
            "notifications".to_string(),
            json!({"email": {"enabled": true, "digest": true}}),
        )]);
        merge_section(
            &mut sections,
            "notifications".to_string(),
            json!({"email": {"enabled": false}}),
        );

        // One level deep only: the nested object is replaced, not merged.
        assert_eq!(sections["notifications"], json!({"email": {"enabled": false}}));
    }

    #[test]
    fn merge_adds_sections_absent_from_the_floor() {
        let mut sections = BTreeMap::new();
        merge_section(&mut sections, "appearance".to_string(), json!({"theme": "dark"}));
        assert_eq!(sections["appearance"], json!({"theme": "dark"}));
    }

    #[test]
    fn config_equals_is_deep() {
        assert!(config_equals(
            &json!({"a": [1, {"b": 2}]}),
            &json!({"a": [1, {"b": 2}]})
        ));
        assert!(!config_equals(&json!({"a": 1}), &json!({"a": 2})));
    }
}
