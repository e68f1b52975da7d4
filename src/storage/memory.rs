use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::features::PlanTier;

use super::error::StorageError;
use super::models::{CompanyFeatureRow, NumberingPatternRow, TenantConfigRow, TerminologyRow};
use super::traits::{
    ConfigRepository, FeatureRepository, NumberingRepository, TerminologyRepository,
};

#[derive(Default)]
struct Inner {
    // (company, project, user, section) -> override value
    configs: HashMap<(Uuid, Option<Uuid>, Option<Uuid>, String), Value>,
    plans: HashMap<Uuid, PlanTier>,
    flags: HashMap<(Uuid, String), bool>,
    // (company, term_key) -> (custom_term, context)
    terms: HashMap<(Uuid, String), (String, Option<String>)>,
    // (company, entity_type, scope) -> (pattern, prefix, suffix)
    patterns: HashMap<(Uuid, String, Option<String>), (String, Option<String>, Option<String>)>,
    sequences: HashMap<(Uuid, String, String), i64>,
    jobs: HashMap<(Uuid, Uuid), String>,
    fail_reads: bool,
}

/// In-memory implementation of every repository trait. Single-node storage
/// backend and the test double for the engines; the single mutex serializes
/// `next_value`, which is what keeps allocations duplicate-free here.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Make every read return a query error, to exercise degraded paths.
    pub async fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().await.fail_reads = fail;
    }

    pub async fn set_plan(&self, company_id: Uuid, tier: PlanTier) {
        self.inner.lock().await.plans.insert(company_id, tier);
    }

    pub async fn put_job(&self, company_id: Uuid, job_id: Uuid, job_number: impl Into<String>) {
        self.inner.lock().await.jobs.insert((company_id, job_id), job_number.into());
    }

    /// Seed a project-level override row. The repository write surface only
    /// covers the company level, so tests set the deeper levels directly.
    pub async fn put_project_override(
        &self,
        company_id: Uuid,
        project_id: Uuid,
        key: &str,
        value: Value,
    ) {
        self.inner
            .lock()
            .await
            .configs
            .insert((company_id, Some(project_id), None, key.to_string()), value);
    }

    pub async fn put_user_override(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        key: &str,
        value: Value,
    ) {
        self.inner
            .lock()
            .await
            .configs
            .insert((company_id, None, Some(user_id), key.to_string()), value);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn guard_reads(inner: &Inner) -> Result<(), StorageError> {
    if inner.fail_reads {
        return Err(StorageError::QueryError("simulated read failure".to_string()));
    }
    Ok(())
}

fn config_row(
    company_id: Uuid,
    project_id: Option<Uuid>,
    user_id: Option<Uuid>,
    key: &str,
    value: &Value,
) -> TenantConfigRow {
    TenantConfigRow {
        company_id,
        project_id,
        user_id,
        key: key.to_string(),
        value: value.clone(),
        updated_at: Utc::now().naive_utc(),
    }
}

#[async_trait]
impl ConfigRepository for MemoryStore {
    async fn company_overrides(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .configs
            .iter()
            .filter(|((company, project, user, _), _)| {
                *company == company_id && project.is_none() && user.is_none()
            })
            .map(|((_, _, _, key), value)| config_row(company_id, None, None, key, value))
            .collect())
    }

    async fn project_overrides(
        &self,
        company_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .configs
            .iter()
            .filter(|((company, project, user, _), _)| {
                *company == company_id && *project == Some(project_id) && user.is_none()
            })
            .map(|((_, _, _, key), value)| {
                config_row(company_id, Some(project_id), None, key, value)
            })
            .collect())
    }

    async fn user_overrides(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .configs
            .iter()
            .filter(|((company, project, user, _), _)| {
                *company == company_id && project.is_none() && *user == Some(user_id)
            })
            .map(|((_, _, _, key), value)| config_row(company_id, None, Some(user_id), key, value))
            .collect())
    }

    async fn company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<Option<TenantConfigRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .configs
            .get(&(company_id, None, None, key.to_string()))
            .map(|value| config_row(company_id, None, None, key, value)))
    }

    async fn upsert_company_override(
        &self,
        company_id: Uuid,
        key: &str,
        value: &Value,
    ) -> Result<(), StorageError> {
        self.inner
            .lock()
            .await
            .configs
            .insert((company_id, None, None, key.to_string()), value.clone());
        Ok(())
    }

    async fn delete_company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<(), StorageError> {
        self.inner
            .lock()
            .await
            .configs
            .remove(&(company_id, None, None, key.to_string()));
        Ok(())
    }
}

#[async_trait]
impl FeatureRepository for MemoryStore {
    async fn company_flags(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<CompanyFeatureRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .flags
            .iter()
            .filter(|((company, _), _)| *company == company_id)
            .map(|((_, key), enabled)| CompanyFeatureRow {
                company_id,
                key: key.clone(),
                enabled: *enabled,
                updated_at: Utc::now().naive_utc(),
            })
            .collect())
    }

    async fn upsert_flag(
        &self,
        company_id: Uuid,
        key: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        self.inner.lock().await.flags.insert((company_id, key.to_string()), enabled);
        Ok(())
    }

    async fn company_plan(&self, company_id: Uuid) -> Result<PlanTier, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        inner
            .plans
            .get(&company_id)
            .copied()
            .ok_or_else(|| StorageError::NotFound(format!("company {}", company_id)))
    }
}

#[async_trait]
impl TerminologyRepository for MemoryStore {
    async fn company_terms(&self, company_id: Uuid) -> Result<Vec<TerminologyRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .terms
            .iter()
            .filter(|((company, _), _)| *company == company_id)
            .map(|((_, term_key), (custom_term, context))| TerminologyRow {
                company_id,
                term_key: term_key.clone(),
                custom_term: custom_term.clone(),
                context: context.clone(),
                updated_at: Utc::now().naive_utc(),
            })
            .collect())
    }

    async fn upsert_term(
        &self,
        company_id: Uuid,
        term_key: &str,
        custom_term: &str,
        context: Option<&str>,
    ) -> Result<(), StorageError> {
        self.inner.lock().await.terms.insert(
            (company_id, term_key.to_string()),
            (custom_term.to_string(), context.map(str::to_string)),
        );
        Ok(())
    }

    async fn delete_term(&self, company_id: Uuid, term_key: &str) -> Result<(), StorageError> {
        self.inner.lock().await.terms.remove(&(company_id, term_key.to_string()));
        Ok(())
    }

    async fn delete_all_terms(&self, company_id: Uuid) -> Result<(), StorageError> {
        self.inner
            .lock()
            .await
            .terms
            .retain(|(company, _), _| *company != company_id);
        Ok(())
    }
}

#[async_trait]
impl NumberingRepository for MemoryStore {
    async fn patterns(&self, company_id: Uuid) -> Result<Vec<NumberingPatternRow>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .patterns
            .iter()
            .filter(|((company, _, _), _)| *company == company_id)
            .map(|((_, entity_type, scope), (pattern, prefix, suffix))| NumberingPatternRow {
                company_id,
                entity_type: entity_type.clone(),
                scope: scope.clone(),
                pattern: pattern.clone(),
                prefix: prefix.clone(),
                suffix: suffix.clone(),
                updated_at: Utc::now().naive_utc(),
            })
            .collect())
    }

    async fn upsert_pattern(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: Option<&str>,
        pattern: &str,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<(), StorageError> {
        self.inner.lock().await.patterns.insert(
            (company_id, entity_type.to_string(), scope.map(str::to_string)),
            (pattern.to_string(), prefix.map(str::to_string), suffix.map(str::to_string)),
        );
        Ok(())
    }

    async fn current_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner
            .sequences
            .get(&(company_id, entity_type.to_string(), scope_key.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn next_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError> {
        // The store mutex is held across the whole read-modify-write, so
        // allocations for the same scope cannot interleave.
        let mut inner = self.inner.lock().await;
        let counter = inner
            .sequences
            .entry((company_id, entity_type.to_string(), scope_key.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn reset_sequence(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if let Some(counter) = inner
            .sequences
            .get_mut(&(company_id, entity_type.to_string(), scope_key.to_string()))
        {
            *counter = 0;
        }
        Ok(())
    }

    async fn job_number(
        &self,
        company_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<String>, StorageError> {
        let inner = self.inner.lock().await;
        guard_reads(&inner)?;
        Ok(inner.jobs.get(&(company_id, job_id)).cloned())
    }
}
