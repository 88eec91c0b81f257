//! Memoization of resolved service handles.

use crate::config::ServiceCacheConfig;
use crate::handle::ServiceHandle;
use crate::identity::ServiceId;
use mini_moka::sync::Cache;

/// Thread-safe store of resolved handles keyed by service identity.
///
/// The locator only ever reads and inserts; replacing an entry is the only
/// way it changes one.
pub trait ServiceCache: Send + Sync {
    fn get(&self, id: ServiceId) -> Option<ServiceHandle>;

    fn put(&self, id: ServiceId, handle: ServiceHandle);

    /// Number of cached handles.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&self);
}

/// In-memory cache backed by `mini_moka`.
pub struct MemoryServiceCache {
    inner: Cache<ServiceId, ServiceHandle>,
}

impl MemoryServiceCache {
    /// Unbounded cache without expiry.
    pub fn new() -> Self {
        Self::with_config(&ServiceCacheConfig::default())
    }

    pub fn with_config(config: &ServiceCacheConfig) -> Self {
        let mut builder = Cache::builder();
        if let Some(max_capacity) = config.max_capacity {
            builder = builder.max_capacity(max_capacity);
        }
        if let Some(time_to_idle) = config.time_to_idle {
            builder = builder.time_to_idle(time_to_idle);
        }
        Self {
            inner: builder.build(),
        }
    }
}

impl Default for MemoryServiceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceCache for MemoryServiceCache {
    fn get(&self, id: ServiceId) -> Option<ServiceHandle> {
        self.inner.get(&id)
    }

    fn put(&self, id: ServiceId, handle: ServiceHandle) {
        self.inner.insert(id, handle);
    }

    /// Walks every entry; O(n) in the number of cached handles.
    fn len(&self) -> u64 {
        self.inner.iter().count() as u64
    }

    fn clear(&self) {
        self.inner.invalidate_all();
    }
}
