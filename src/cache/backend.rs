use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::error::CacheError;
use super::key::glob_match;

/// Pluggable backing store for the cache layer. Values cross this boundary
/// as JSON; typed encode/decode happens in `CacheStore`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every key matching an anchored `*`-wildcard pattern.
    async fn delete_matching(&self, pattern: &str) -> Result<(), CacheError>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process backing store for single-node deployments.
///
/// An expired entry is a miss from the moment its TTL elapses; physical
/// removal happens in a lazy sweep that runs at most once per
/// `SWEEP_INTERVAL`, piggybacked on writes.
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    last_sweep: Mutex<Instant>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    async fn sweep_if_due(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock().await;
            if now.duration_since(*last) < SWEEP_INTERVAL {
                return;
            }
            *last = now;
        }
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() < before {
            tracing::debug!(evicted = before - entries.len(), "cache sweep removed expired entries");
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.sweep_if_due().await;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry { value, expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok(())
    }
}

/// Shared key-value service for multi-node deployments, reached over HTTP
/// with a bearer token.
///
/// Service contract: `GET`/`PUT`/`DELETE /keys/{key}` for single entries
/// (404 on a miss, TTL carried in the PUT body) and `POST /invalidate` with
/// a wildcard pattern for bulk removal.
pub struct RemoteBackend {
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct PutBody<'a> {
    value: &'a Value,
    ttl_secs: u64,
}

#[derive(serde::Deserialize)]
struct GetBody {
    value: Value,
}

#[derive(serde::Serialize)]
struct InvalidateBody<'a> {
    pattern: &'a str,
}

impl RemoteBackend {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn key_url(&self, key: &str) -> Result<Url, CacheError> {
        self.base_url
            .join(&format!("keys/{}", percent_encode(key)))
            .map_err(|e| CacheError::Backend(format!("invalid key url: {}", e)))
    }

    fn invalidate_url(&self) -> Result<Url, CacheError> {
        self.base_url
            .join("invalidate")
            .map_err(|e| CacheError::Backend(format!("invalid invalidate url: {}", e)))
    }
}

/// Percent-encode everything outside the unreserved set. Keys contain `:`
/// and `*`, which are not path-safe.
fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[async_trait]
impl CacheBackend for RemoteBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let response = self
            .client
            .get(self.key_url(key)?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetBody = response.error_for_status()?.json().await?;
        Ok(Some(body.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.client
            .put(self.key_url(key)?)
            .bearer_auth(&self.token)
            .json(&PutBody { value: &value, ttl_secs: ttl.as_secs() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let response = self
            .client
            .delete(self.key_url(key)?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        // Deleting an absent key is not a fault.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<(), CacheError> {
        self.client
            .post(self.invalidate_url()?)
            .bearer_auth(&self.token)
            .json(&InvalidateBody { pattern })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let backend = MemoryBackend::new();
        backend
            .set("company:abc:profile", json!({"name": "Acme"}), Duration::from_secs(60))
            .await
            .unwrap();

        let hit = backend.get("company:abc:profile").await.unwrap();
        assert_eq!(hit, Some(json!({"name": "Acme"})));

        backend.delete("company:abc:profile").await.unwrap();
        assert_eq!(backend.get("company:abc:profile").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses_before_the_sweep() {
        let backend = MemoryBackend::new();
        backend
            .set("settings:abc:config", json!(1), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(backend.get("settings:abc:config").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_matching_is_scoped_to_the_pattern() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(60);
        backend.set("settings:c1:config", json!(1), ttl).await.unwrap();
        backend.set("settings:c1:features", json!(2), ttl).await.unwrap();
        backend.set("settings:c2:config", json!(3), ttl).await.unwrap();

        backend.delete_matching("*:c1:*").await.unwrap();

        assert_eq!(backend.get("settings:c1:config").await.unwrap(), None);
        assert_eq!(backend.get("settings:c1:features").await.unwrap(), None);
        assert_eq!(backend.get("settings:c2:config").await.unwrap(), Some(json!(3)));
    }

    #[test]
    fn percent_encoding_escapes_separators() {
        assert_eq!(percent_encode("settings:abc:*"), "settings%3Aabc%3A%2A");
        assert_eq!(percent_encode("plain-key_1.0~x"), "plain-key_1.0~x");
    }
}
