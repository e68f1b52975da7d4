use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One settings override row. Company-level rows have neither `project_id`
/// nor `user_id`; the more specific levels set exactly one of them. `key`
/// names a settings section, `value` is that section's field override map.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantConfigRow {
    pub company_id: Uuid,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub key: String,
    pub value: Value,
    pub updated_at: NaiveDateTime,
}

/// Company-level feature flag override. Absence of a row means "use the
/// definition default."
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyFeatureRow {
    pub company_id: Uuid,
    pub key: String,
    pub enabled: bool,
    pub updated_at: NaiveDateTime,
}

/// Company override for one vocabulary term. Absence means "use the system
/// default term."
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TerminologyRow {
    pub company_id: Uuid,
    pub term_key: String,
    pub custom_term: String,
    pub context: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// Format template for one entity type's numbers, optionally narrowed by
/// scope kind (e.g. per-job invoice numbering).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NumberingPatternRow {
    pub company_id: Uuid,
    pub entity_type: String,
    pub scope: Option<String>,
    pub pattern: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// Durable atomic counter backing a numbering pattern. Mutated only by the
/// increment-and-fetch operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NumberingSequenceRow {
    pub company_id: Uuid,
    pub entity_type: String,
    pub scope_key: String,
    pub current_value: i64,
    pub updated_at: NaiveDateTime,
}
