use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CacheKey, CachePrefix, CacheStore, CacheTtl};
use crate::storage::{FeatureRepository, StorageError};

/// Subscription plan tiers, totally ordered from least to most capable.
/// Tier gating compares with this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Starter,
    Professional,
    Business,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::Business => "business",
            PlanTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(PlanTier::Free),
            "starter" => Some(PlanTier::Starter),
            "professional" => Some(PlanTier::Professional),
            "business" => Some(PlanTier::Business),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }
}

/// One entry of the static capability catalog.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureFlagDefinition {
    pub key: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
    pub min_plan_tier: Option<PlanTier>,
}

/// The full capability catalog. Fixed at deploy time, like the platform
/// defaults.
pub static FEATURE_FLAG_DEFINITIONS: &[FeatureFlagDefinition] = &[
    FeatureFlagDefinition {
        key: "job_scheduling",
        description: "Calendar-based job and task scheduling",
        default_enabled: true,
        min_plan_tier: None,
    },
    FeatureFlagDefinition {
        key: "gantt_view",
        description: "Gantt chart view for project schedules",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Professional),
    },
    FeatureFlagDefinition {
        key: "advanced_estimating",
        description: "Assembly-based estimating with cost catalogs",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Professional),
    },
    FeatureFlagDefinition {
        key: "purchase_orders",
        description: "Purchase order creation and vendor tracking",
        default_enabled: true,
        min_plan_tier: Some(PlanTier::Starter),
    },
    FeatureFlagDefinition {
        key: "change_orders",
        description: "Change order workflow on jobs",
        default_enabled: true,
        min_plan_tier: None,
    },
    FeatureFlagDefinition {
        key: "client_portal",
        description: "Client-facing portal with selections and approvals",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Starter),
    },
    FeatureFlagDefinition {
        key: "vendor_portal",
        description: "Vendor-facing portal for bid requests",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Business),
    },
    FeatureFlagDefinition {
        key: "document_esign",
        description: "Electronic signatures on proposals and contracts",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Business),
    },
    FeatureFlagDefinition {
        key: "time_tracking",
        description: "Crew time clock and timesheets",
        default_enabled: true,
        min_plan_tier: Some(PlanTier::Starter),
    },
    FeatureFlagDefinition {
        key: "payroll_export",
        description: "Timesheet export to payroll providers",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Business),
    },
    FeatureFlagDefinition {
        key: "custom_reports",
        description: "Report builder with saved custom reports",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Business),
    },
    FeatureFlagDefinition {
        key: "api_access",
        description: "External REST API tokens",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Enterprise),
    },
    FeatureFlagDefinition {
        key: "equipment_tracking",
        description: "Equipment assignment and maintenance logs",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Professional),
    },
    FeatureFlagDefinition {
        key: "safety_checklists",
        description: "Jobsite safety checklists and toolbox talks",
        default_enabled: true,
        min_plan_tier: None,
    },
    FeatureFlagDefinition {
        key: "multi_entity_accounting",
        description: "Separate books per operating entity",
        default_enabled: false,
        min_plan_tier: Some(PlanTier::Enterprise),
    },
];

pub fn definition(key: &str) -> Option<&'static FeatureFlagDefinition> {
    FEATURE_FLAG_DEFINITIONS.iter().find(|def| def.key == key)
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("unknown feature flag: {0}")]
    UnknownFlag(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Cached per-company inputs to flag resolution: the plan tier plus the
/// company's override rows. One fetch hydrates every flag check.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompanyFeatureState {
    plan: PlanTier,
    overrides: BTreeMap<String, bool>,
}

const STATE_SEGMENTS: &[&str] = &["features", "state"];

/// Per-company boolean capability switches, constrained by subscription
/// plan. A flag explicitly enabled for a company whose plan no longer
/// qualifies resolves to disabled.
pub struct FeatureGate {
    repo: Arc<dyn FeatureRepository>,
    cache: Arc<CacheStore>,
}

impl FeatureGate {
    pub fn new(repo: Arc<dyn FeatureRepository>, cache: Arc<CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// The static catalog, for settings UI.
    pub fn definitions() -> &'static [FeatureFlagDefinition] {
        FEATURE_FLAG_DEFINITIONS
    }

    async fn state(&self, company_id: Uuid) -> CompanyFeatureState {
        let key = CacheKey::tenant(CachePrefix::Settings, company_id, STATE_SEGMENTS);
        if let Some(hit) = self.cache.get::<CompanyFeatureState>(&key).await {
            return hit;
        }
        let state = self.fetch_state(company_id).await;
        self.cache.set(&key, &state, CacheTtl::Medium).await;
        state
    }

    /// Fetch faults degrade: missing overrides fall back to definition
    /// defaults, an unknown plan resolves as the lowest tier so plan-gated
    /// flags stay closed.
    async fn fetch_state(&self, company_id: Uuid) -> CompanyFeatureState {
        let plan = match self.repo.company_plan(company_id).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(company_id = %company_id, error = %e, "plan tier fetch failed, gating as free");
                PlanTier::Free
            }
        };
        let overrides = match self.repo.company_flags(company_id).await {
            Ok(rows) => rows.into_iter().map(|row| (row.key, row.enabled)).collect(),
            Err(e) => {
                tracing::warn!(company_id = %company_id, error = %e, "flag overrides fetch failed, using defaults");
                BTreeMap::new()
            }
        };
        CompanyFeatureState { plan, overrides }
    }

    fn resolve(def: &FeatureFlagDefinition, state: &CompanyFeatureState) -> bool {
        if let Some(min_tier) = def.min_plan_tier {
            if state.plan < min_tier {
                return false;
            }
        }
        state.overrides.get(def.key).copied().unwrap_or(def.default_enabled)
    }

    pub async fn is_enabled(&self, company_id: Uuid, key: &str) -> bool {
        let Some(def) = definition(key) else {
            tracing::warn!(company_id = %company_id, flag = key, "unknown feature flag, resolving disabled");
            return false;
        };
        let state = self.state(company_id).await;
        Self::resolve(def, &state)
    }

    /// Every defined flag resolved for one company in a single fetch.
    pub async fn flags(&self, company_id: Uuid) -> BTreeMap<String, bool> {
        let state = self.state(company_id).await;
        FEATURE_FLAG_DEFINITIONS
            .iter()
            .map(|def| (def.key.to_string(), Self::resolve(def, &state)))
            .collect()
    }

    /// Batched check over a caller-chosen key set; shares one state fetch.
    pub async fn are_enabled(&self, company_id: Uuid, keys: &[&str]) -> BTreeMap<String, bool> {
        let state = self.state(company_id).await;
        keys.iter()
            .map(|key| {
                let enabled = match definition(key) {
                    Some(def) => Self::resolve(def, &state),
                    None => {
                        tracing::warn!(company_id = %company_id, flag = key, "unknown feature flag, resolving disabled");
                        false
                    }
                };
                (key.to_string(), enabled)
            })
            .collect()
    }

    pub async fn set_flag(
        &self,
        company_id: Uuid,
        key: &str,
        enabled: bool,
    ) -> Result<(), FeatureError> {
        if definition(key).is_none() {
            return Err(FeatureError::UnknownFlag(key.to_string()));
        }
        self.repo.upsert_flag(company_id, key, enabled).await?;
        // Durable write first, then invalidation.
        self.invalidate(company_id).await;
        Ok(())
    }

    pub async fn set_flags(
        &self,
        company_id: Uuid,
        patch: &BTreeMap<String, bool>,
    ) -> Result<(), FeatureError> {
        for key in patch.keys() {
            if definition(key).is_none() {
                return Err(FeatureError::UnknownFlag(key.clone()));
            }
        }
        for (key, enabled) in patch {
            self.repo.upsert_flag(company_id, key, *enabled).await?;
        }
        self.invalidate(company_id).await;
        Ok(())
    }

    pub async fn clear_cache(&self, company_id: Option<Uuid>) {
        match company_id {
            Some(company_id) => self.invalidate(company_id).await,
            None => self.cache.invalidate_pattern("settings:*:features:*").await,
        }
    }

    async fn invalidate(&self, company_id: Uuid) {
        self.cache
            .invalidate_pattern(&format!("settings:{}:features:*", company_id))
            .await;
    }
}
