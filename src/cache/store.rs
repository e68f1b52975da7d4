use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::backend::{CacheBackend, MemoryBackend, RemoteBackend};
use super::key::{CacheKey, CachePrefix};

/// Named expiration tiers, used instead of raw second counts at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 60 seconds
    Short,
    /// 5 minutes
    Medium,
    /// 1 hour
    Long,
    /// 24 hours
    Day,
    /// 30 minutes
    Session,
    /// Explicit second count for the odd case the tiers don't cover
    Secs(u64),
}

impl CacheTtl {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(match self {
            CacheTtl::Short => 60,
            CacheTtl::Medium => 300,
            CacheTtl::Long => 3_600,
            CacheTtl::Day => 86_400,
            CacheTtl::Session => 1_800,
            CacheTtl::Secs(secs) => *secs,
        })
    }
}

pub const CACHE_SERVICE_URL_VAR: &str = "CACHE_SERVICE_URL";
pub const CACHE_SERVICE_TOKEN_VAR: &str = "CACHE_SERVICE_TOKEN";

/// The cache policy boundary.
///
/// Every operation here is best-effort: a backend fault is logged and
/// becomes a miss or a no-op, never an error to the caller. The one
/// exception is `cache_through`, where the *fetcher's* failure propagates:
/// the fetcher is the thing being cached, not part of the cache.
///
/// Constructed explicitly (once at process start) and passed by `Arc` to
/// whatever needs it; tests build isolated instances over their own
/// backends.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn in_process() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Select the backend from the environment: a shared key-value service
    /// when `CACHE_SERVICE_URL` is set, the in-process map otherwise.
    /// Absence or a malformed URL falls back to in-process, never an error.
    pub fn from_env() -> Self {
        let raw = match std::env::var(CACHE_SERVICE_URL_VAR) {
            Ok(raw) => raw,
            Err(_) => return Self::in_process(),
        };
        match url::Url::parse(&raw) {
            Ok(base_url) => {
                let token = std::env::var(CACHE_SERVICE_TOKEN_VAR).unwrap_or_default();
                tracing::info!(url = %base_url, "cache store using shared key-value service");
                Self::with_backend(Arc::new(RemoteBackend::new(base_url, token)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed CACHE_SERVICE_URL, using in-process cache");
                Self::in_process()
            }
        }
    }

    /// Cached value if present and fresh, `None` otherwise. An undecodable
    /// entry counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.backend.get(key.as_str()).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "corrupt cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: CacheTtl) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "unserializable cache value, skipping set");
                return;
            }
        };
        if let Err(e) = self.backend.set(key.as_str(), encoded, ttl.as_duration()).await {
            tracing::warn!(key = %key, error = %e, "cache set failed");
        }
    }

    /// Idempotent removal.
    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.backend.delete(key.as_str()).await {
            tracing::warn!(key = %key, error = %e, "cache delete failed");
        }
    }

    /// Remove every key matching an anchored `*`-wildcard pattern.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        if let Err(e) = self.backend.delete_matching(pattern).await {
            tracing::warn!(pattern, error = %e, "cache pattern invalidation failed");
        }
    }

    /// Drop every tenant key belonging to one company. Global keys and other
    /// companies' keys are untouched.
    pub async fn invalidate_company(&self, company_id: Uuid) {
        self.invalidate_pattern(&format!("*:{}:*", company_id)).await;
    }

    /// Read-through: serve the cached value if fresh, otherwise run the
    /// fetcher, cache its result, and return it.
    pub async fn cache_through<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: CacheTtl,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// `cache_through` with the key built from tenant parts.
    pub async fn tenant_cache_through<T, E, F, Fut>(
        &self,
        company_id: Uuid,
        prefix: CachePrefix,
        segments: &[&str],
        ttl: CacheTtl,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = CacheKey::tenant(prefix, company_id, segments);
        self.cache_through(&key, ttl, fetch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ttl_tiers_map_to_seconds() {
        assert_eq!(CacheTtl::Short.as_duration(), Duration::from_secs(60));
        assert_eq!(CacheTtl::Medium.as_duration(), Duration::from_secs(300));
        assert_eq!(CacheTtl::Long.as_duration(), Duration::from_secs(3_600));
        assert_eq!(CacheTtl::Day.as_duration(), Duration::from_secs(86_400));
        assert_eq!(CacheTtl::Session.as_duration(), Duration::from_secs(1_800));
        assert_eq!(CacheTtl::Secs(7).as_duration(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn cache_through_fetches_exactly_once_while_fresh() {
        let store = CacheStore::in_process();
        let key = CacheKey::tenant(CachePrefix::Settings, Uuid::new_v4(), &["config"]);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, std::convert::Infallible> = store
                .cache_through(&key, CacheTtl::Short, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_through_propagates_fetcher_failure_without_caching() {
        let store = CacheStore::in_process();
        let key = CacheKey::tenant(CachePrefix::Settings, Uuid::new_v4(), &["config"]);

        let failed: Result<u32, &str> = store
            .cache_through(&key, CacheTtl::Short, || async { Err("storage down") })
            .await;
        assert_eq!(failed, Err("storage down"));

        // The failure was not cached; a later successful fetch lands.
        let recovered: Result<u32, &str> = store
            .cache_through(&key, CacheTtl::Short, || async { Ok(7) })
            .await;
        assert_eq!(recovered, Ok(7));
    }

    #[tokio::test]
    async fn invalidate_company_leaves_other_tenants_alone() {
        let store = CacheStore::in_process();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let my_key = CacheKey::tenant(CachePrefix::Settings, mine, &["config"]);
        let their_key = CacheKey::tenant(CachePrefix::Settings, theirs, &["config"]);

        store.set(&my_key, &1u32, CacheTtl::Short).await;
        store.set(&their_key, &2u32, CacheTtl::Short).await;

        store.invalidate_company(mine).await;

        assert_eq!(store.get::<u32>(&my_key).await, None);
        assert_eq!(store.get::<u32>(&their_key).await, Some(2));
    }

    #[tokio::test]
    async fn corrupt_entries_read_as_misses() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::with_backend(backend.clone());
        let key = CacheKey::tenant(CachePrefix::Company, Uuid::new_v4(), &["profile"]);

        // A string where the reader expects a number.
        store.set(&key, &"not a number", CacheTtl::Short).await;
        assert_eq!(store.get::<u64>(&key).await, None);
    }
}
