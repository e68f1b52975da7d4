use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::PlanTier;

use super::error::StorageError;
use super::models::{CompanyFeatureRow, NumberingPatternRow, TenantConfigRow, TerminologyRow};
use super::traits::{
    ConfigRepository, FeatureRepository, NumberingRepository, TerminologyRepository,
};

/// Production storage backend over Postgres. Row-level tenant isolation is
/// enforced by the database; every query here still carries the company
/// predicate explicitly.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConfigRepository for PgStore {
    async fn company_overrides(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let rows = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT company_id, project_id, user_id, key, value, updated_at
             FROM tenant_configs
             WHERE company_id = $1 AND project_id IS NULL AND user_id IS NULL
             ORDER BY key",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn project_overrides(
        &self,
        company_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let rows = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT company_id, project_id, user_id, key, value, updated_at
             FROM tenant_configs
             WHERE company_id = $1 AND project_id = $2 AND user_id IS NULL
             ORDER BY key",
        )
        .bind(company_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn user_overrides(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError> {
        let rows = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT company_id, project_id, user_id, key, value, updated_at
             FROM tenant_configs
             WHERE company_id = $1 AND user_id = $2 AND project_id IS NULL
             ORDER BY key",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<Option<TenantConfigRow>, StorageError> {
        let row = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT company_id, project_id, user_id, key, value, updated_at
             FROM tenant_configs
             WHERE company_id = $1 AND key = $2
               AND project_id IS NULL AND user_id IS NULL",
        )
        .bind(company_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_company_override(
        &self,
        company_id: Uuid,
        key: &str,
        value: &Value,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO tenant_configs (company_id, key, value)
             VALUES ($1, $2, $3)
             ON CONFLICT (company_id, key) WHERE project_id IS NULL AND user_id IS NULL
             DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(company_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "DELETE FROM tenant_configs
             WHERE company_id = $1 AND key = $2
               AND project_id IS NULL AND user_id IS NULL",
        )
        .bind(company_id)
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FeatureRepository for PgStore {
    async fn company_flags(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<CompanyFeatureRow>, StorageError> {
        let rows = sqlx::query_as::<_, CompanyFeatureRow>(
            "SELECT company_id, key, enabled, updated_at
             FROM company_features
             WHERE company_id = $1
             ORDER BY key",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_flag(
        &self,
        company_id: Uuid,
        key: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO company_features (company_id, key, enabled)
             VALUES ($1, $2, $3)
             ON CONFLICT (company_id, key)
             DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = now()",
        )
        .bind(company_id)
        .bind(key)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn company_plan(&self, company_id: Uuid) -> Result<PlanTier, StorageError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT plan_tier FROM companies WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;

        let raw = raw.ok_or_else(|| StorageError::NotFound(format!("company {}", company_id)))?;
        Ok(PlanTier::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(company_id = %company_id, plan = %raw, "unknown plan tier, treating as free");
            PlanTier::Free
        }))
    }
}

#[async_trait]
impl TerminologyRepository for PgStore {
    async fn company_terms(&self, company_id: Uuid) -> Result<Vec<TerminologyRow>, StorageError> {
        let rows = sqlx::query_as::<_, TerminologyRow>(
            "SELECT company_id, term_key, custom_term, context, updated_at
             FROM terminology_overrides
             WHERE company_id = $1
             ORDER BY term_key",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_term(
        &self,
        company_id: Uuid,
        term_key: &str,
        custom_term: &str,
        context: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO terminology_overrides (company_id, term_key, custom_term, context)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (company_id, term_key)
             DO UPDATE SET custom_term = EXCLUDED.custom_term,
                           context = EXCLUDED.context,
                           updated_at = now()",
        )
        .bind(company_id)
        .bind(term_key)
        .bind(custom_term)
        .bind(context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_term(&self, company_id: Uuid, term_key: &str) -> Result<(), StorageError> {
        sqlx::query(
            "DELETE FROM terminology_overrides WHERE company_id = $1 AND term_key = $2",
        )
        .bind(company_id)
        .bind(term_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_all_terms(&self, company_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM terminology_overrides WHERE company_id = $1")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NumberingRepository for PgStore {
    async fn patterns(&self, company_id: Uuid) -> Result<Vec<NumberingPatternRow>, StorageError> {
        let rows = sqlx::query_as::<_, NumberingPatternRow>(
            "SELECT company_id, entity_type, scope, pattern, prefix, suffix, updated_at
             FROM numbering_patterns
             WHERE company_id = $1
             ORDER BY entity_type, scope NULLS LAST",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
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
        sqlx::query(
            "INSERT INTO numbering_patterns (company_id, entity_type, scope, pattern, prefix, suffix)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (company_id, entity_type, COALESCE(scope, ''))
             DO UPDATE SET pattern = EXCLUDED.pattern,
                           prefix = EXCLUDED.prefix,
                           suffix = EXCLUDED.suffix,
                           updated_at = now()",
        )
        .bind(company_id)
        .bind(entity_type)
        .bind(scope)
        .bind(pattern)
        .bind(prefix)
        .bind(suffix)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn current_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT current_value FROM numbering_sequences
             WHERE company_id = $1 AND entity_type = $2 AND scope_key = $3",
        )
        .bind(company_id)
        .bind(entity_type)
        .bind(scope_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.unwrap_or(0))
    }

    async fn next_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError> {
        // Single statement so Postgres serializes concurrent allocations on
        // the counter row; never a read followed by a separate write.
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO numbering_sequences (company_id, entity_type, scope_key, current_value)
             VALUES ($1, $2, $3, 1)
             ON CONFLICT (company_id, entity_type, scope_key)
             DO UPDATE SET current_value = numbering_sequences.current_value + 1,
                           updated_at = now()
             RETURNING current_value",
        )
        .bind(company_id)
        .bind(entity_type)
        .bind(scope_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    async fn reset_sequence(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE numbering_sequences
             SET current_value = 0, updated_at = now()
             WHERE company_id = $1 AND entity_type = $2 AND scope_key = $3",
        )
        .bind(company_id)
        .bind(entity_type)
        .bind(scope_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn job_number(
        &self,
        company_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<String>, StorageError> {
        let number: Option<String> = sqlx::query_scalar(
            "SELECT job_number FROM jobs WHERE company_id = $1 AND id = $2",
        )
        .bind(company_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(number)
    }
}
