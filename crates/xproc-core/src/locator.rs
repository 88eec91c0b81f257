//! Resolve-by-identity entry point.

use crate::builder::ServiceLocatorBuilder;
use crate::cache::ServiceCache;
use crate::directory::{DirectoryClient, DirectoryConnector, DirectoryLookup};
use crate::endpoint::EndpointRef;
use crate::error::{LocatorError, Result};
use crate::handle::{FromEndpoint, ServiceHandle};
use crate::identity::ServiceId;
use crate::oracle::ProcessOracle;
use crate::proxy::ServiceHandleProxy;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Hands out cached handles to services living in other processes.
///
/// The first `resolve` for an identity goes to the directory; later ones are
/// answered from the cache. Failed resolutions are never cached.
///
/// # Example
///
/// ```rust,ignore
/// use xproc_locator::{CallMode, ServiceId, ServiceLocator};
/// use xproc_locator::lookup::RegistryLookup;
///
/// let locator = ServiceLocator::builder()
///     .lookup(RegistryLookup::open()?)
///     .connector(my_transport)
///     .build()?;
///
/// if let Some(echo) = locator.resolve(ServiceId::new(7)) {
///     echo.transact(1, b"hello", CallMode::Blocking)?;
/// }
/// ```
pub struct ServiceLocator {
    directory: Arc<DirectoryClient>,
    cache: Arc<dyn ServiceCache>,
    oracle: Arc<dyn ProcessOracle>,
}

impl ServiceLocator {
    pub fn builder() -> ServiceLocatorBuilder {
        ServiceLocatorBuilder::new()
    }

    pub(crate) fn from_parts(
        lookup: Arc<dyn DirectoryLookup>,
        connector: Arc<dyn DirectoryConnector>,
        cache: Arc<dyn ServiceCache>,
        oracle: Arc<dyn ProcessOracle>,
    ) -> Self {
        Self {
            directory: DirectoryClient::new(lookup, connector),
            cache,
            oracle,
        }
    }

    /// Resolve `id` to a handle, or `None` when the directory cannot be reached
    /// or does not know the service.
    pub fn resolve(&self, id: ServiceId) -> Option<ServiceHandle> {
        if let Some(handle) = self.cache.get(id) {
            debug!("Service {} served from cache", id);
            return Some(handle);
        }

        match self.fetch_wrapped(id) {
            Ok(handle) => {
                self.cache.put(id, handle.clone());
                debug!("Service {} resolved and cached", id);
                Some(handle)
            }
            Err(e) => {
                debug!("Service {} not resolved: {}", id, e);
                None
            }
        }
    }

    /// Resolve `id` without consulting or filling the cache.
    pub fn fetch(&self, id: ServiceId) -> Option<ServiceHandle> {
        self.fetch_wrapped(id).ok()
    }

    /// Resolve `id` and adapt the handle into a typed interface.
    ///
    /// `Ok(None)` means the service could not be resolved; an error means it
    /// was, but the adapter rejected the endpoint.
    pub fn resolve_as<T: FromEndpoint>(&self, id: ServiceId) -> Result<Option<T>> {
        self.resolve(id)
            .map(ServiceHandle::into_interface)
            .transpose()
    }

    /// The directory's own endpoint.
    pub fn directory_endpoint(&self) -> Option<EndpointRef> {
        self.directory.directory_endpoint()
    }

    pub fn directory(&self) -> &Arc<DirectoryClient> {
        &self.directory
    }

    pub fn cache(&self) -> &Arc<dyn ServiceCache> {
        &self.cache
    }

    fn fetch_wrapped(&self, id: ServiceId) -> Result<ServiceHandle> {
        let conn = self.directory.try_connection()?;
        let raw = conn
            .get_service(id)?
            .ok_or(LocatorError::EndpointUnavailable { service_id: id })?;
        let wrapped = ServiceHandleProxy::wrap(
            id,
            raw,
            Arc::clone(&self.directory),
            self.oracle.as_ref(),
        );
        Ok(ServiceHandle::from_wrapped(id, wrapped))
    }
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
