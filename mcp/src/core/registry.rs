//! Concurrent registry of live client handles keyed by session id.
//!
//! Handles are shared as `Arc`s. Removal is compare-and-remove: a caller
//! holding a stale handle cannot evict a replacement registered after it.

use std::{fmt, hash::Hash, sync::Arc};

use dashmap::DashMap;
use rmcp::{service::RunningService, RoleClient};
use tracing::debug;

pub type SessionId = u64;

/// Running MCP client session.
pub type McpClient = RunningService<RoleClient, ()>;

pub type McpClientRegistry = ClientRegistry<SessionId, McpClient>;

pub struct ClientRegistry<K, H> {
    clients: DashMap<K, Arc<H>>,
}

impl<K, H> ClientRegistry<K, H>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    pub fn get(&self, id: &K) -> Option<Arc<H>> {
        self.clients.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert or replace the handle for `id`. Returns the previous handle.
    pub fn put(&self, id: K, client: Arc<H>) -> Option<Arc<H>> {
        let previous = self.clients.insert(id.clone(), client);
        if previous.is_some() {
            debug!(session = ?id, "replaced registered client");
        }
        previous
    }

    /// Remove the entry for `id` only if it still holds this exact handle.
    ///
    /// Identity is pointer identity of the `Arc`, not value equality.
    pub fn remove_if_matches(&self, id: &K, client: &Arc<H>) -> bool {
        self.clients
            .remove_if(id, |_, current| Arc::ptr_eq(current, client))
            .is_some()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn ids(&self) -> Vec<K> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl<K, H> Default for ClientRegistry<K, H>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, H> fmt::Debug for ClientRegistry<K, H>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}
