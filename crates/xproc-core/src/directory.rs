//! Shared connection to the service directory.
//!
//! [`DirectoryClient`] resolves the connection lazily, at most one attempt at
//! a time, and forgets it when the directory endpoint terminates so that the
//! next caller re-resolves.

use crate::endpoint::{same_endpoint, DeathRecipient, EndpointDescriptor, EndpointRef, RemoteEndpoint};
use crate::error::{LocatorError, Result};
use crate::identity::ServiceId;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Source of the directory's published endpoint descriptor.
pub trait DirectoryLookup: Send + Sync {
    /// Return the serialized [`EndpointDescriptor`] of the directory.
    fn locate(&self) -> Result<Vec<u8>>;
}

/// Transport hook turning a descriptor into a live directory connection.
pub trait DirectoryConnector: Send + Sync {
    fn connect(&self, descriptor: &EndpointDescriptor) -> Result<Arc<dyn DirectoryConnection>>;
}

/// A live channel to the directory process.
pub trait DirectoryConnection: Send + Sync {
    /// The directory's own endpoint; its termination invalidates the connection.
    fn endpoint(&self) -> EndpointRef;

    /// Look up the raw endpoint registered for `id`.
    fn get_service(&self, id: ServiceId) -> Result<Option<EndpointRef>>;
}

/// Shared connection reference.
pub type ConnectionRef = Arc<dyn DirectoryConnection>;

/// Lazily-resolved, invalidatable directory connection.
///
/// Always handled through an `Arc`; the client registers itself weakly as the
/// termination listener of the connection it caches.
pub struct DirectoryClient {
    lookup: Arc<dyn DirectoryLookup>,
    connector: Arc<dyn DirectoryConnector>,
    cached: RwLock<Option<ConnectionRef>>,
    /// Serializes resolution attempts and holds the outcome of the last one.
    resolve_lock: Mutex<Option<ConnectionRef>>,
    /// Completed resolution attempts, used to share one outcome among waiters.
    attempts: AtomicU64,
    me: Weak<DirectoryClient>,
}

impl DirectoryClient {
    pub fn new(lookup: Arc<dyn DirectoryLookup>, connector: Arc<dyn DirectoryConnector>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            lookup,
            connector,
            cached: RwLock::new(None),
            resolve_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
            me: me.clone(),
        })
    }

    /// Get the directory connection, resolving it if none is cached.
    ///
    /// Concurrent callers on a cold client share a single attempt: all of them
    /// see the same connection, or all see `None` when that attempt failed.
    /// A failure is not retried here; the next call starts a fresh attempt.
    ///
    /// A connection whose endpoint cannot be watched, or that dies while being
    /// watched, counts as a failed attempt.
    pub fn connection(&self) -> Option<ConnectionRef> {
        if let Some(conn) = self.cached.read().as_ref() {
            return Some(Arc::clone(conn));
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last = self.resolve_lock.lock();

        if let Some(conn) = self.cached.read().as_ref() {
            return Some(Arc::clone(conn));
        }
        if self.attempts.load(Ordering::Acquire) != seen {
            // An attempt finished while we waited; report what it reported.
            debug!("Sharing directory resolution outcome with concurrent caller");
            return last.clone();
        }

        let outcome = match self.resolve() {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Directory resolution failed: {}", e);
                None
            }
        };
        *last = outcome.clone();
        self.attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Like [`connection`](Self::connection) but reports failure as
    /// [`LocatorError::DirectoryUnavailable`].
    pub fn try_connection(&self) -> Result<ConnectionRef> {
        self.connection()
            .ok_or_else(|| LocatorError::DirectoryUnavailable {
                message: "no directory connection could be established".to_string(),
            })
    }

    /// Raw endpoint for `id`, unwrapped and uncached.
    ///
    /// Errors from the connection are logged and reported as `None`.
    pub fn raw_service(&self, id: ServiceId) -> Option<EndpointRef> {
        let conn = self.connection()?;
        match conn.get_service(id) {
            Ok(Some(endpoint)) => Some(endpoint),
            Ok(None) => {
                debug!("Directory has no endpoint for service {}", id);
                None
            }
            Err(e) => {
                warn!("Directory lookup for service {} failed: {}", id, e);
                None
            }
        }
    }

    /// The directory's own endpoint, resolving the connection if needed.
    pub fn directory_endpoint(&self) -> Option<EndpointRef> {
        self.connection().map(|conn| conn.endpoint())
    }

    /// True when a connection is currently cached.
    pub fn is_connected(&self) -> bool {
        self.cached.read().is_some()
    }

    /// Number of resolution attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Drop the cached connection without waiting for a termination notice.
    pub fn invalidate(&self) {
        if let Some(conn) = self.cached.write().take() {
            let recipient: Weak<dyn DeathRecipient> = self.me.clone();
            conn.endpoint().unlink_to_death(&recipient);
            debug!("Directory connection invalidated");
        }
    }

    fn resolve(&self) -> Result<ConnectionRef> {
        let bytes = self
            .lookup
            .locate()
            .map_err(|e| LocatorError::DirectoryUnavailable {
                message: format!("lookup failed: {}", e),
            })?;
        let descriptor =
            EndpointDescriptor::from_bytes(&bytes).map_err(|e| LocatorError::DirectoryUnavailable {
                message: e.to_string(),
            })?;
        let conn = self
            .connector
            .connect(&descriptor)
            .map_err(|e| LocatorError::DirectoryUnavailable {
                message: format!("connect to '{}' failed: {}", descriptor.address, e),
            })?;

        // Cache before linking so a termination notice delivered during the
        // link finds the connection and clears it.
        *self.cached.write() = Some(Arc::clone(&conn));

        let recipient: Weak<dyn DeathRecipient> = self.me.clone();
        if let Err(e) = conn.endpoint().link_to_death(recipient) {
            self.forget(&conn);
            return Err(LocatorError::DirectoryUnavailable {
                message: format!("cannot watch directory '{}': {}", descriptor.name, e),
            });
        }
        if !self.holds(&conn) {
            return Err(LocatorError::DirectoryUnavailable {
                message: format!("directory '{}' died while connecting", descriptor.name),
            });
        }

        info!(
            "Connected to directory '{}' (pid {}) at {}",
            descriptor.name, descriptor.pid, descriptor.address
        );
        Ok(conn)
    }
}

impl DirectoryClient {
    fn holds(&self, conn: &ConnectionRef) -> bool {
        self.cached
            .read()
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, conn))
    }

    fn forget(&self, conn: &ConnectionRef) {
        let mut cached = self.cached.write();
        if cached.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
            *cached = None;
        }
    }
}

impl DeathRecipient for DirectoryClient {
    fn endpoint_died(&self, endpoint: &dyn RemoteEndpoint) {
        let mut cached = self.cached.write();
        let current = cached
            .as_ref()
            .is_some_and(|conn| same_endpoint(conn.endpoint().as_ref(), endpoint));
        if current {
            *cached = None;
            info!("Directory connection died, will re-resolve on next use");
        } else {
            debug!("Ignoring termination of a superseded directory connection");
        }
    }
}

impl fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("connected", &self.is_connected())
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}
