//! State shared between the runtime and service modules.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::cache::TieredCache;
use crate::client::ClientPool;
use crate::config::ServerConfig;

/// Handles every handler and the runtime share for the process lifetime.
///
/// Cloning is cheap; all members are reference counted.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<ServerConfig>,
    pub cache: Arc<TieredCache>,
    pools: Arc<RwLock<Vec<Arc<dyn ClientPool>>>>,
}

/// What a reset released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResetSummary {
    pub cache_entries: usize,
    pub clients: usize,
}

impl SharedState {
    pub fn new(config: ServerConfig) -> Self {
        let cache = TieredCache::new(config.cache.clone());
        Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            pools: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a client pool so it is released on reset and shutdown.
    pub fn register_pool(&self, pool: Arc<dyn ClientPool>) {
        tracing::debug!(pool = pool.pool_name(), "registered client pool");
        self.pools.write().push(pool);
    }

    pub fn pool_count(&self) -> usize {
        self.pools.read().len()
    }

    pub fn active_clients(&self) -> usize {
        self.pools.read().iter().map(|p| p.active_clients()).sum()
    }

    /// Clear every cache tier and release every pooled client.
    pub fn reset(&self) -> ResetSummary {
        let cache_entries = self.cache.clear_all();
        let clients = self.pools.read().iter().map(|p| p.release_all()).sum();
        ResetSummary {
            cache_entries,
            clients,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("config", &self.config)
            .field("pools", &self.pool_count())
            .finish()
    }
}
