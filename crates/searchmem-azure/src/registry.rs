use crate::engine::{SearchIndexClient, SearchService};
use crate::naming::normalize_index_name;
use parking_lot::RwLock;
use searchmem_core::SearchMemResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Cache of per-index clients, keyed by normalized index name.
///
/// Clients are built lazily on first use and kept for the lifetime of the
/// registry. A client whose index was deleted keeps failing with not-found
/// until the index is created again.
pub struct ClientRegistry {
    service: Arc<dyn SearchService>,
    clients: RwLock<HashMap<String, Arc<dyn SearchIndexClient>>>,
}

impl ClientRegistry {
    /// Creates an empty registry over `service`.
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self {
            service,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the client for `index`, building it on first use.
    pub fn get_client(&self, index: &str) -> SearchMemResult<Arc<dyn SearchIndexClient>> {
        let name = normalize_index_name(index)?;

        if let Some(client) = self.clients.read().get(&name) {
            return Ok(Arc::clone(client));
        }

        // Re-checked under the write lock so concurrent misses build one client.
        let mut clients = self.clients.write();
        let client = clients.entry(name).or_insert_with_key(|name| {
            debug!(index = %name, "Creating search client");
            self.service.index_client(name)
        });
        Ok(Arc::clone(client))
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no client was built yet.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
