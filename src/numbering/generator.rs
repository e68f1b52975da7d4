use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CachePrefix, CacheStore, CacheTtl};
use crate::storage::{NumberingPatternRow, NumberingRepository, StorageError};

use super::pattern::{default_pattern, format_pattern, validate_pattern, TokenContext};

#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("invalid numbering pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a sequence is counted against. Company-wide sequences share one
/// counter per entity type; job-scoped sequences (per-job invoice numbers
/// and the like) get a counter per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberScope {
    Company,
    Job(Uuid),
}

impl NumberScope {
    fn key(&self) -> String {
        match self {
            NumberScope::Company => "default".to_string(),
            NumberScope::Job(job_id) => job_id.simple().to_string(),
        }
    }

    fn kind(&self) -> Option<&'static str> {
        match self {
            NumberScope::Company => None,
            NumberScope::Job(_) => Some("job"),
        }
    }
}

/// Explicit acknowledgement for a counter reset. Resetting reopens the door
/// to reissuing previously-used numbers, so the engine refuses to do it on
/// anything less than this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceReset {
    Confirmed,
}

const PATTERNS_SEGMENTS: &[&str] = &["numbering", "patterns"];

/// Pattern-formatted, gapless-per-scope sequential identifiers.
///
/// Patterns are read-mostly and cached; counters are NEVER cached. Every
/// allocation goes to durable storage, whose atomic increment is the only
/// thing standing between concurrent requests and duplicate numbers.
pub struct NumberingService {
    repo: Arc<dyn NumberingRepository>,
    cache: Arc<CacheStore>,
}

impl NumberingService {
    pub fn new(repo: Arc<dyn NumberingRepository>, cache: Arc<CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// Allocate the next number for a scope. Storage faults propagate:
    /// an entity that needs a number cannot be created without one, so this
    /// is never silently defaulted.
    pub async fn next_number(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: NumberScope,
    ) -> Result<String, NumberingError> {
        let pattern = self.pattern_for(company_id, entity_type, scope).await?;
        let counter = self
            .repo
            .next_value(company_id, entity_type, &scope.key())
            .await?;
        Ok(self.format(company_id, &pattern, counter, scope).await)
    }

    /// Format what the next allocation would produce without advancing the
    /// counter. Safe to call repeatedly (preview UI); it never mutates.
    pub async fn preview_next_number(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: NumberScope,
    ) -> Result<String, NumberingError> {
        let pattern = self.pattern_for(company_id, entity_type, scope).await?;
        let current = self
            .repo
            .current_value(company_id, entity_type, &scope.key())
            .await?;
        Ok(self.format(company_id, &pattern, current + 1, scope).await)
    }

    async fn format(
        &self,
        company_id: Uuid,
        pattern: &NumberingPatternRow,
        counter: i64,
        scope: NumberScope,
    ) -> String {
        // The job's own number is resolved at format time; a lookup fault
        // degrades to empty rather than discarding an allocated counter.
        let job_number = match (scope, pattern.pattern.contains("{JOB}")) {
            (NumberScope::Job(job_id), true) => {
                match self.repo.job_number(company_id, job_id).await {
                    Ok(number) => number,
                    Err(e) => {
                        tracing::warn!(company_id = %company_id, job_id = %job_id, error = %e,
                            "job number lookup failed, substituting empty");
                        None
                    }
                }
            }
            _ => None,
        };
        let ctx = TokenContext {
            job_number: job_number.as_deref(),
            prefix: pattern.prefix.as_deref(),
            suffix: pattern.suffix.as_deref(),
        };
        format_pattern(&pattern.pattern, counter, Utc::now(), &ctx)
    }

    /// The effective pattern row for an allocation: the most specific
    /// configured pattern (scope match over scope-less), else the built-in
    /// default for the entity type.
    async fn pattern_for(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: NumberScope,
    ) -> Result<NumberingPatternRow, NumberingError> {
        let configured = self.patterns(company_id).await?;
        let scope_kind = scope.kind();

        let best = configured
            .iter()
            .filter(|row| row.entity_type == entity_type)
            .filter(|row| row.scope.is_none() || row.scope.as_deref() == scope_kind)
            .max_by_key(|row| row.scope.is_some());

        Ok(match best {
            Some(row) => row.clone(),
            None => NumberingPatternRow {
                company_id,
                entity_type: entity_type.to_string(),
                scope: None,
                pattern: default_pattern(entity_type).to_string(),
                prefix: None,
                suffix: None,
                updated_at: Utc::now().naive_utc(),
            },
        })
    }

    /// Configured patterns for a company, cached read-mostly. A storage
    /// fault here propagates: allocation cannot pick a pattern without it.
    pub async fn patterns(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<NumberingPatternRow>, NumberingError> {
        let repo = Arc::clone(&self.repo);
        let rows = self
            .cache
            .tenant_cache_through(
                company_id,
                CachePrefix::Settings,
                PATTERNS_SEGMENTS,
                CacheTtl::Long,
                || async move { repo.patterns(company_id).await },
            )
            .await?;
        Ok(rows)
    }

    /// Configure a pattern. Rejects syntactically invalid patterns instead
    /// of storing unusable configuration; never touches counters.
    pub async fn set_pattern(
        &self,
        company_id: Uuid,
        entity_type: &str,
        pattern: &str,
        scope: Option<&str>,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<(), NumberingError> {
        let validation = validate_pattern(pattern);
        if !validation.valid {
            return Err(NumberingError::InvalidPattern(validation.errors.join("; ")));
        }
        self.repo
            .upsert_pattern(company_id, entity_type, scope, pattern, prefix, suffix)
            .await?;
        self.invalidate(company_id).await;
        Ok(())
    }

    /// Administrative counter reset. Distinct from allocation and gated on
    /// an explicit acknowledgement token.
    pub async fn reset_sequence(
        &self,
        company_id: Uuid,
        entity_type: &str,
        scope: NumberScope,
        _ack: SequenceReset,
    ) -> Result<(), NumberingError> {
        self.repo
            .reset_sequence(company_id, entity_type, &scope.key())
            .await?;
        tracing::info!(company_id = %company_id, entity_type, scope = %scope.key(),
            "numbering sequence reset to 0");
        Ok(())
    }

    /// Patterns only; counters are never cached in the first place.
    pub async fn clear_cache(&self, company_id: Option<Uuid>) {
        match company_id {
            Some(company_id) => self.invalidate(company_id).await,
            None => self.cache.invalidate_pattern("settings:*:numbering:*").await,
        }
    }

    async fn invalidate(&self, company_id: Uuid) {
        self.cache
            .invalidate_pattern(&format!("settings:{}:numbering:*", company_id))
            .await;
    }
}
