//! Tiered response cache.
//!
//! Cloud data changes at very different rates: region and shape metadata is
//! effectively static while instance states change minute to minute. The
//! cache is partitioned into [`Tier`]s, each with its own time-to-live, so a
//! handler can cache aggressively where it is safe and briefly where it is not.
//!
//! Expiry is lazy: an entry is checked (and dropped) when it is read. Tiers
//! are bounded by the set of distinct keys handlers query, so no sweeper runs.
//!
//! ```
//! use skyhook_core::cache::{CacheConfig, Tier, TieredCache};
//! use serde_json::json;
//!
//! let cache = TieredCache::new(CacheConfig::default());
//! cache.set(Tier::Static, "regions", json!(["us-east-1"]));
//! assert_eq!(cache.get(Tier::Static, "regions"), Some(json!(["us-east-1"])));
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Independently-expiring cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Rarely changes (regions, shapes, service catalogues)
    Static,
    /// Changes occasionally (account and resource configuration)
    Config,
    /// Changes frequently (instance and job states)
    Operational,
    /// Near-real-time values
    Metrics,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Static, Tier::Config, Tier::Operational, Tier::Metrics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Static => "static",
            Tier::Config => "config",
            Tier::Operational => "operational",
            Tier::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Tier::Static),
            "config" => Ok(Tier::Config),
            "operational" => Ok(Tier::Operational),
            "metrics" => Ok(Tier::Metrics),
            other => Err(format!("unknown cache tier '{}'", other)),
        }
    }
}

/// Per-tier time-to-live settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub static_ttl: Duration,
    pub config_ttl: Duration,
    pub operational_ttl: Duration,
    pub metrics_ttl: Duration,
}

impl CacheConfig {
    pub const DEFAULT_STATIC_TTL: Duration = Duration::from_secs(3600);
    pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(300);
    pub const DEFAULT_OPERATIONAL_TTL: Duration = Duration::from_secs(60);
    pub const DEFAULT_METRICS_TTL: Duration = Duration::from_secs(15);

    pub fn ttl(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Static => self.static_ttl,
            Tier::Config => self.config_ttl,
            Tier::Operational => self.operational_ttl,
            Tier::Metrics => self.metrics_ttl,
        }
    }

    /// Override the TTL of one tier
    pub fn with_ttl(mut self, tier: Tier, ttl: Duration) -> Self {
        match tier {
            Tier::Static => self.static_ttl = ttl,
            Tier::Config => self.config_ttl = ttl,
            Tier::Operational => self.operational_ttl = ttl,
            Tier::Metrics => self.metrics_ttl = ttl,
        }
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_ttl: Self::DEFAULT_STATIC_TTL,
            config_ttl: Self::DEFAULT_CONFIG_TTL,
            operational_ttl: Self::DEFAULT_OPERATIONAL_TTL,
            metrics_ttl: Self::DEFAULT_METRICS_TTL,
        }
    }
}

struct CacheEntry {
    value: Value,
    created_at: Instant,
}

struct TierStore {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl TierStore {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

/// Statistics for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: f64,
}

/// Statistics for every tier, keyed by tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub tiers: BTreeMap<Tier, TierStats>,
}

impl CacheStats {
    pub fn total_entries(&self) -> usize {
        self.tiers.values().map(|t| t.entries).sum()
    }
}

/// Thread-safe cache partitioned into independently-expiring tiers.
pub struct TieredCache {
    tiers: Mutex<HashMap<Tier, TierStore>>,
}

impl TieredCache {
    pub fn new(config: CacheConfig) -> Self {
        let tiers = Tier::ALL
            .iter()
            .map(|&tier| (tier, TierStore::new(config.ttl(tier))))
            .collect();
        Self {
            tiers: Mutex::new(tiers),
        }
    }

    /// Return the cached value if present and unexpired.
    pub fn get(&self, tier: Tier, key: &str) -> Option<Value> {
        let mut tiers = self.tiers.lock();
        let store = tiers.get_mut(&tier)?;

        let expired = store
            .entries
            .get(key)
            .map(|entry| entry.created_at.elapsed() >= store.ttl);
        let fresh = match expired {
            Some(false) => store.entries.get(key).map(|entry| entry.value.clone()),
            Some(true) => {
                store.entries.remove(key);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            store.hits += 1;
            tracing::debug!(%tier, key, "cache hit");
        } else {
            store.misses += 1;
            tracing::debug!(%tier, key, "cache miss");
        }
        fresh
    }

    /// Store a value with the tier's TTL, replacing any existing entry.
    pub fn set(&self, tier: Tier, key: impl Into<String>, value: Value) {
        let mut tiers = self.tiers.lock();
        if let Some(store) = tiers.get_mut(&tier) {
            store.entries.insert(
                key.into(),
                CacheEntry {
                    value,
                    created_at: Instant::now(),
                },
            );
        }
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// The lock is not held while `fetch` runs; failures are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        tier: Tier,
        key: &str,
        fetch: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(tier, key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(tier, key, value.clone());
        Ok(value)
    }

    /// Drop every entry of one tier. Returns the number of entries removed.
    pub fn clear_tier(&self, tier: Tier) -> usize {
        let mut tiers = self.tiers.lock();
        tiers.get_mut(&tier).map_or(0, |store| {
            let removed = store.entries.len();
            store.entries.clear();
            removed
        })
    }

    /// Empty every tier. Returns the number of entries removed.
    pub fn clear_all(&self) -> usize {
        let mut tiers = self.tiers.lock();
        let removed = tiers
            .values_mut()
            .map(|store| {
                let n = store.entries.len();
                store.entries.clear();
                n
            })
            .sum();
        tracing::debug!(removed, "cleared all cache tiers");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let tiers = self.tiers.lock();
        CacheStats {
            tiers: tiers
                .iter()
                .map(|(&tier, store)| {
                    (
                        tier,
                        TierStats {
                            entries: store.entries.len(),
                            hits: store.hits,
                            misses: store.misses,
                            ttl_secs: store.ttl.as_secs_f64(),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Compute a stable cache key for a JSON value (keys sorted, SHA-256, hex).
pub fn hash_key(value: &Value) -> String {
    use sha2::{Digest, Sha256};

    let canonical = canonicalize_json(value);
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    format!("{:x}", Sha256::digest(json.as_bytes()))
}

fn canonicalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<_, _> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize_json).collect()),
        other => other.clone(),
    }
}
