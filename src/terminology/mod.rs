use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CacheKey, CachePrefix, CacheStore, CacheTtl};
use crate::storage::{StorageError, TerminologyRepository};

/// One entry of the default vocabulary. `context` groups terms for the
/// settings UI and is carried onto override rows.
#[derive(Debug, Clone, Copy)]
pub struct TermDefault {
    pub key: &'static str,
    pub singular: &'static str,
    pub plural: &'static str,
    pub context: &'static str,
}

const fn term(
    key: &'static str,
    singular: &'static str,
    plural: &'static str,
    context: &'static str,
) -> TermDefault {
    TermDefault { key, singular, plural, context }
}

/// System default display vocabulary. Companies override individual entries;
/// everything else falls back here.
pub static DEFAULT_TERMINOLOGY: &[TermDefault] = &[
    term("job", "Job", "Jobs", "entities"),
    term("lead", "Lead", "Leads", "entities"),
    term("client", "Client", "Clients", "entities"),
    term("vendor", "Vendor", "Vendors", "entities"),
    term("subcontractor", "Subcontractor", "Subcontractors", "entities"),
    term("estimate", "Estimate", "Estimates", "entities"),
    term("bid", "Bid", "Bids", "entities"),
    term("proposal", "Proposal", "Proposals", "entities"),
    term("contract", "Contract", "Contracts", "entities"),
    term("invoice", "Invoice", "Invoices", "financials"),
    term("payment", "Payment", "Payments", "financials"),
    term("deposit", "Deposit", "Deposits", "financials"),
    term("credit_memo", "Credit Memo", "Credit Memos", "financials"),
    term("expense", "Expense", "Expenses", "financials"),
    term("budget", "Budget", "Budgets", "financials"),
    term("cost_code", "Cost Code", "Cost Codes", "financials"),
    term("retainage", "Retainage", "Retainage", "financials"),
    term("draw", "Draw", "Draws", "financials"),
    term("purchase_order", "Purchase Order", "Purchase Orders", "procurement"),
    term("change_order", "Change Order", "Change Orders", "procurement"),
    term("work_order", "Work Order", "Work Orders", "field"),
    term("service_ticket", "Service Ticket", "Service Tickets", "field"),
    term("task", "Task", "Tasks", "scheduling"),
    term("phase", "Phase", "Phases", "scheduling"),
    term("milestone", "Milestone", "Milestones", "scheduling"),
    term("schedule", "Schedule", "Schedules", "scheduling"),
    term("punch_list", "Punch List", "Punch Lists", "field"),
    term("daily_log", "Daily Log", "Daily Logs", "field"),
    term("timesheet", "Timesheet", "Timesheets", "field"),
    term("inspection", "Inspection", "Inspections", "field"),
    term("permit", "Permit", "Permits", "field"),
    term("safety_meeting", "Safety Meeting", "Safety Meetings", "field"),
    term("toolbox_talk", "Toolbox Talk", "Toolbox Talks", "field"),
    term("rfi", "RFI", "RFIs", "documents"),
    term("submittal", "Submittal", "Submittals", "documents"),
    term("selection", "Selection", "Selections", "documents"),
    term("allowance", "Allowance", "Allowances", "documents"),
    term("warranty", "Warranty", "Warranties", "documents"),
    term("takeoff", "Takeoff", "Takeoffs", "estimating"),
    term("markup", "Markup", "Markups", "estimating"),
    term("overhead", "Overhead", "Overhead", "estimating"),
    term("labor", "Labor", "Labor", "estimating"),
    term("material", "Material", "Materials", "estimating"),
    term("equipment", "Equipment", "Equipment", "estimating"),
    term("crew", "Crew", "Crews", "people"),
    term("foreman", "Foreman", "Foremen", "people"),
    term("superintendent", "Superintendent", "Superintendents", "people"),
    term("project_manager", "Project Manager", "Project Managers", "people"),
    term("site", "Site", "Sites", "entities"),
    term("receipt", "Receipt", "Receipts", "financials"),
];

pub fn default_for(key: &str) -> Option<&'static TermDefault> {
    DEFAULT_TERMINOLOGY.iter().find(|def| def.key == key)
}

/// Standard English pluralization, used for company-overridden terms, which
/// store the singular only.
pub fn pluralize(singular: &str) -> String {
    let lower = singular.to_lowercase();
    if let Some(stem) = singular.strip_suffix('y') {
        let before_y = lower.chars().rev().nth(1);
        let is_vowel = matches!(before_y, Some('a' | 'e' | 'i' | 'o' | 'u'));
        if !is_vowel && !stem.is_empty() {
            return format!("{}ies", stem);
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{}es", singular);
    }
    format!("{}s", singular)
}

#[derive(Debug, Error)]
pub enum TerminologyError {
    #[error("unknown term key: {0}")]
    UnknownTerm(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

const OVERRIDES_SEGMENTS: &[&str] = &["terminology", "overrides"];

/// Per-company display vocabulary. Lookups fall through company override ->
/// system default -> the key itself, and never fail: a missing translation
/// must not break a page render.
pub struct TerminologyEngine {
    repo: Arc<dyn TerminologyRepository>,
    cache: Arc<CacheStore>,
}

impl TerminologyEngine {
    pub fn new(repo: Arc<dyn TerminologyRepository>, cache: Arc<CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// The static system defaults, keyed by term.
    pub fn defaults() -> BTreeMap<&'static str, &'static str> {
        DEFAULT_TERMINOLOGY.iter().map(|def| (def.key, def.singular)).collect()
    }

    async fn overrides(&self, company_id: Uuid) -> BTreeMap<String, String> {
        let key = CacheKey::tenant(CachePrefix::Settings, company_id, OVERRIDES_SEGMENTS);
        if let Some(hit) = self.cache.get::<BTreeMap<String, String>>(&key).await {
            return hit;
        }
        let overrides = match self.repo.company_terms(company_id).await {
            Ok(rows) => rows.into_iter().map(|row| (row.term_key, row.custom_term)).collect(),
            Err(e) => {
                tracing::warn!(company_id = %company_id, error = %e, "terminology fetch failed, using defaults");
                BTreeMap::new()
            }
        };
        self.cache.set(&key, &overrides, CacheTtl::Long).await;
        overrides
    }

    fn resolve(overrides: &BTreeMap<String, String>, key: &str) -> String {
        if let Some(custom) = overrides.get(key) {
            return custom.clone();
        }
        if let Some(def) = default_for(key) {
            return def.singular.to_string();
        }
        tracing::warn!(term = key, "unknown term key, falling back to the key itself");
        key.to_string()
    }

    pub async fn term(&self, company_id: Uuid, key: &str) -> String {
        let overrides = self.overrides(company_id).await;
        Self::resolve(&overrides, key)
    }

    pub async fn term_plural(&self, company_id: Uuid, key: &str) -> String {
        let overrides = self.overrides(company_id).await;
        if let Some(custom) = overrides.get(key) {
            return pluralize(custom);
        }
        if let Some(def) = default_for(key) {
            return def.plural.to_string();
        }
        tracing::warn!(term = key, "unknown term key, falling back to the key itself");
        key.to_string()
    }

    /// Batched lookup; shares one override fetch.
    pub async fn terms(&self, company_id: Uuid, keys: &[&str]) -> BTreeMap<String, String> {
        let overrides = self.overrides(company_id).await;
        keys.iter()
            .map(|key| (key.to_string(), Self::resolve(&overrides, key)))
            .collect()
    }

    /// The full resolved vocabulary, for hydrating an app-wide terminology
    /// context once per session.
    pub async fn all_terminology(&self, company_id: Uuid) -> BTreeMap<String, String> {
        let overrides = self.overrides(company_id).await;
        DEFAULT_TERMINOLOGY
            .iter()
            .map(|def| (def.key.to_string(), Self::resolve(&overrides, def.key)))
            .collect()
    }

    pub async fn set_term(
        &self,
        company_id: Uuid,
        key: &str,
        custom_term: &str,
    ) -> Result<(), TerminologyError> {
        let def = default_for(key).ok_or_else(|| TerminologyError::UnknownTerm(key.to_string()))?;
        self.repo.upsert_term(company_id, key, custom_term, Some(def.context)).await?;
        self.invalidate(company_id).await;
        Ok(())
    }

    pub async fn set_terms(
        &self,
        company_id: Uuid,
        patch: &BTreeMap<String, String>,
    ) -> Result<(), TerminologyError> {
        // Validate the whole patch up front so a bad key cannot leave a
        // partial write behind.
        for key in patch.keys() {
            if default_for(key).is_none() {
                return Err(TerminologyError::UnknownTerm(key.clone()));
            }
        }
        for (key, custom_term) in patch {
            let def =
                default_for(key).ok_or_else(|| TerminologyError::UnknownTerm(key.clone()))?;
            self.repo.upsert_term(company_id, key, custom_term, Some(def.context)).await?;
        }
        self.invalidate(company_id).await;
        Ok(())
    }

    /// Remove one override, or every override when no key is given,
    /// reverting to system defaults.
    pub async fn reset(
        &self,
        company_id: Uuid,
        key: Option<&str>,
    ) -> Result<(), TerminologyError> {
        match key {
            Some(key) => self.repo.delete_term(company_id, key).await?,
            None => self.repo.delete_all_terms(company_id).await?,
        }
        self.invalidate(company_id).await;
        Ok(())
    }

    /// Snapshot-bound lookup for a single-tenant request context: one async
    /// hydration, then synchronous reads.
    pub async fn helper(&self, company_id: Uuid) -> TerminologyHelper {
        let overrides = self.overrides(company_id).await;
        let mut singulars = BTreeMap::new();
        let mut plurals = BTreeMap::new();
        for def in DEFAULT_TERMINOLOGY {
            match overrides.get(def.key) {
                Some(custom) => {
                    singulars.insert(def.key.to_string(), custom.clone());
                    plurals.insert(def.key.to_string(), pluralize(custom));
                }
                None => {
                    singulars.insert(def.key.to_string(), def.singular.to_string());
                    plurals.insert(def.key.to_string(), def.plural.to_string());
                }
            }
        }
        TerminologyHelper { singulars, plurals }
    }

    pub async fn clear_cache(&self, company_id: Option<Uuid>) {
        match company_id {
            Some(company_id) => self.invalidate(company_id).await,
            None => self.cache.invalidate_pattern("settings:*:terminology:*").await,
        }
    }

    async fn invalidate(&self, company_id: Uuid) {
        self.cache
            .invalidate_pattern(&format!("settings:{}:terminology:*", company_id))
            .await;
    }
}

/// Resolved vocabulary snapshot bound to one company.
pub struct TerminologyHelper {
    singulars: BTreeMap<String, String>,
    plurals: BTreeMap<String, String>,
}

impl TerminologyHelper {
    pub fn term<'a>(&'a self, key: &'a str) -> &'a str {
        self.singulars.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn term_plural<'a>(&'a self, key: &'a str) -> &'a str {
        self.plurals.get(key).map(String::as_str).unwrap_or(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for def in DEFAULT_TERMINOLOGY {
            assert!(seen.insert(def.key), "duplicate term key {}", def.key);
        }
    }

    #[test]
    fn pluralize_handles_common_endings() {
        assert_eq!(pluralize("Project"), "Projects");
        assert_eq!(pluralize("Warranty"), "Warranties");
        assert_eq!(pluralize("Punch"), "Punches");
        assert_eq!(pluralize("Class"), "Classes");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Box"), "Boxes");
    }

    #[test]
    fn resolve_falls_back_default_then_key() {
        let overrides = BTreeMap::from([("job".to_string(), "Project".to_string())]);
        assert_eq!(TerminologyEngine::resolve(&overrides, "job"), "Project");
        assert_eq!(TerminologyEngine::resolve(&overrides, "client"), "Client");
        assert_eq!(TerminologyEngine::resolve(&overrides, "no_such_term"), "no_such_term");
    }
}
