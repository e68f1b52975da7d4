use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::features::PlanTier;

use super::error::StorageError;
use super::models::{CompanyFeatureRow, NumberingPatternRow, TenantConfigRow, TerminologyRow};

/// Settings override rows, per resolution level.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn company_overrides(&self, company_id: Uuid)
        -> Result<Vec<TenantConfigRow>, StorageError>;

    async fn project_overrides(
        &self,
        company_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError>;

    async fn user_overrides(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TenantConfigRow>, StorageError>;

    async fn company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<Option<TenantConfigRow>, StorageError>;

    async fn upsert_company_override(
        &self,
        company_id: Uuid,
        key: &str,
        value: &Value,
    ) -> Result<(), StorageError>;

    /// Physically removes the override row; the section reverts to the less
    /// specific levels.
    async fn delete_company_override(
        &self,
        company_id: Uuid,
        key: &str,
    ) -> Result<(), StorageError>;
}

/// Feature flag overrides plus the subscription tier they are gated by.
#[async_trait]
pub trait FeatureRepository: Send + Sync {
    async fn company_flags(&self, company_id: Uuid)
        -> Result<Vec<CompanyFeatureRow>, StorageError>;

    async fn upsert_flag(
        &self,
        company_id: Uuid,
        key: &str,
        enabled: bool,
    ) -> Result<(), StorageError>;

    async fn company_plan(&self, company_id: Uuid) -> Result<PlanTier, StorageError>;
}

#[async_trait]
pub trait TerminologyRepository: Send + Sync {
    async fn company_terms(&self, company_id: Uuid) -> Result<Vec<TerminologyRow>, StorageError>;

    async fn upsert_term(
        &self,
        company_id: Uuid,
        term_key: &str,
        custom_term: &str,
        context: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn delete_term(&self, company_id: Uuid, term_key: &str) -> Result<(), StorageError>;

    async fn delete_all_terms(&self, company_id: Uuid) -> Result<(), StorageError>;
}

/// Numbering patterns and the durable counters behind them.
#[async_trait]
pub trait NumberingRepository: Send + Sync {
    async fn patterns(&self, company_id: Uuid)
        -> Result<Vec<NumberingPatternRow>, StorageError>;

    async fn upsert_pattern(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: Option<&str>,
        pattern: &str,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Current counter value without advancing it; 0 if the counter row does
    /// not exist yet.
    async fn current_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError>;

    /// Atomic increment-and-fetch. Implementations MUST serialize this per
    /// (company, entity type, scope key) at the storage layer: a plain
    /// read-then-write races under concurrent allocation and hands out
    /// duplicate numbers.
    async fn next_value(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<i64, StorageError>;

    /// Administrative counter reset to 0. Callers gate this behind an
    /// explicit acknowledgement; reissuing numbers is on them.
    async fn reset_sequence(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope_key: &str,
    ) -> Result<(), StorageError>;

    /// The job's own generated number, for patterns that embed it.
    async fn job_number(
        &self,
        company_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<String>, StorageError>;
}
