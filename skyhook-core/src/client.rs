//! Pooled external API clients.
//!
//! Building an SDK client means resolving credentials and setting up an HTTP
//! connection pool, which is too expensive to repeat on every tool call. A
//! [`ClientManager`] builds each client lazily, once per [`ClientKey`], through
//! a [`ClientFactory`] and hands out shared references afterwards.
//!
//! # Guarantees
//!
//! - construct-once-per-key, including under concurrent first use;
//! - a failed construction is never cached, the next `get` retries;
//! - `clear()` drops every client, later calls rebuild.
//!
//! # Test Isolation
//!
//! Managers are plain values; tests create their own with a counting factory.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Profile name used when neither the call nor the configuration names one
pub const DEFAULT_PROFILE: &str = "default";

/// Identity of a pooled client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub client_type: String,
    pub region: String,
    pub profile: String,
}

impl ClientKey {
    pub fn new(
        client_type: impl Into<String>,
        region: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            client_type: client_type.into(),
            region: region.into(),
            profile: profile.into(),
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.client_type, self.region, self.profile)
    }
}

/// A client could not be constructed (bad credentials, unreachable endpoint, ...)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to initialize {key} client: {message}")]
pub struct ClientInitError {
    pub key: ClientKey,
    pub message: String,
}

impl ClientInitError {
    pub fn new(key: &ClientKey, message: impl Into<String>) -> Self {
        Self {
            key: key.clone(),
            message: message.into(),
        }
    }
}

/// Builds clients for a [`ClientManager`].
pub trait ClientFactory: Send + Sync {
    type Client: Send + Sync;

    fn create(
        &self,
        key: &ClientKey,
    ) -> impl Future<Output = Result<Self::Client, ClientInitError>> + Send;
}

/// Type-erased view of a client pool, used by the runtime to release clients
/// without knowing their concrete type.
pub trait ClientPool: Send + Sync {
    fn pool_name(&self) -> &str;

    /// Drop every pooled client. Returns the number released.
    fn release_all(&self) -> usize;

    fn active_clients(&self) -> usize;
}

/// Lazily constructs and caches clients keyed by [`ClientKey`].
pub struct ClientManager<F: ClientFactory> {
    name: String,
    factory: F,
    clients: Mutex<HashMap<ClientKey, Arc<OnceCell<Arc<F::Client>>>>>,
}

impl<F: ClientFactory> ClientManager<F> {
    pub fn new(name: impl Into<String>, factory: F) -> Self {
        Self {
            name: name.into(),
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Return the client for `key`, constructing it on first use.
    pub async fn get(&self, key: &ClientKey) -> Result<Arc<F::Client>, ClientInitError> {
        let cell = {
            let mut clients = self.clients.lock();
            Arc::clone(clients.entry(key.clone()).or_default())
        };

        let result = cell
            .get_or_try_init(|| async {
                tracing::debug!(pool = %self.name, %key, "constructing client");
                self.factory.create(key).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        if let Err(e) = &result {
            tracing::warn!(pool = %self.name, %key, error = %e, "client construction failed");
            self.discard_failed(key, &cell);
        }
        result
    }

    /// Drop the map entry for `key` if it is still the uninitialized `cell`.
    /// A concurrent caller may already have replaced or filled it.
    fn discard_failed(&self, key: &ClientKey, cell: &Arc<OnceCell<Arc<F::Client>>>) {
        let mut clients = self.clients.lock();
        if clients
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized())
        {
            clients.remove(key);
        }
    }

    /// True if a constructed client exists for `key`
    pub fn contains(&self, key: &ClientKey) -> bool {
        self.clients
            .lock()
            .get(key)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of constructed clients
    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all clients. Returns the number of constructed clients released.
    pub fn clear(&self) -> usize {
        let mut clients = self.clients.lock();
        let released = clients.values().filter(|cell| cell.initialized()).count();
        clients.clear();
        tracing::debug!(pool = %self.name, released, "released pooled clients");
        released
    }
}

impl<F: ClientFactory> ClientPool for ClientManager<F> {
    fn pool_name(&self) -> &str {
        &self.name
    }

    fn release_all(&self) -> usize {
        self.clear()
    }

    fn active_clients(&self) -> usize {
        self.len()
    }
}
