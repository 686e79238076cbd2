use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Consider cache stale after 1 hour.
/// Balances freshness with reducing unnecessary API calls for slowly-changing data.
const CACHE_STALE_MINUTES: i64 = 60;

/// Seam through which the session layer wipes user-scoped data.
///
/// Called exactly once per identity change, never on a same-identity token
/// renewal. Implementations must not panic and must tolerate being called
/// when the cache is already empty.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_all(&self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

struct CachedEntry {
    value: serde_json::Value,
    cached_at: DateTime<Utc>,
}

/// In-memory store of user-scoped API responses, keyed by name.
///
/// Values are held as JSON so heterogeneous response types can share one map.
/// All data here belongs to the signed-in identity; the session layer clears
/// it through [`CacheInvalidator`] whenever that identity changes.
#[derive(Default)]
pub struct DataCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)
            .with_context(|| format!("Failed to serialize cache entry: {}", key))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedData<T>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        let data: T = serde_json::from_value(entry.value.clone())
            .with_context(|| format!("Failed to parse cache entry: {}", key))?;
        Ok(Some(CachedData {
            data,
            cached_at: entry.cached_at,
        }))
    }

    /// Missing entries count as stale.
    pub fn is_stale(&self, key: &str) -> bool {
        match self.entries.read() {
            Ok(entries) => match entries.get(key) {
                Some(entry) => CachedData {
                    data: (),
                    cached_at: entry.cached_at,
                }
                .is_stale(),
                None => true,
            },
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to read cache for staleness check");
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheInvalidator for DataCache {
    fn invalidate_all(&self) {
        match self.entries.write() {
            Ok(mut entries) => {
                let dropped = entries.len();
                entries.clear();
                debug!(entries = dropped, "Invalidated all cached data");
            }
            Err(e) => {
                debug!(error = %e, "Failed to lock cache for invalidation");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
impl DataCache {
    fn backdate(&self, key: &str, minutes: i64) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(key) {
                entry.cached_at = Utc::now() - chrono::Duration::minutes(minutes);
            }
        }
    }
}
