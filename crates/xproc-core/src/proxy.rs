//! Self-healing wrapper around a remote service endpoint.
//!
//! A [`ServiceHandleProxy`] remembers which service it stands for. When the
//! endpoint it holds terminates, the proxy drops it; the next forwarded call
//! asks the directory for the service again instead of failing against a
//! dead endpoint.

use crate::directory::DirectoryClient;
use crate::endpoint::{same_endpoint, CallMode, DeathRecipient, EndpointRef, LocalObject, RemoteEndpoint};
use crate::error::{LocatorError, Result};
use crate::identity::ServiceId;
use crate::oracle::ProcessOracle;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Result of [`ServiceHandleProxy::wrap`].
#[derive(Clone)]
pub enum Wrapped {
    /// The endpoint lives in this process and is returned as is.
    Direct(EndpointRef),
    Proxied(Arc<ServiceHandleProxy>),
}

impl Wrapped {
    /// The endpoint callers should use.
    pub fn endpoint(&self) -> EndpointRef {
        match self {
            Wrapped::Direct(endpoint) => Arc::clone(endpoint),
            Wrapped::Proxied(proxy) => Arc::clone(proxy) as EndpointRef,
        }
    }

    pub fn proxy(&self) -> Option<&Arc<ServiceHandleProxy>> {
        match self {
            Wrapped::Direct(_) => None,
            Wrapped::Proxied(proxy) => Some(proxy),
        }
    }
}

/// Endpoint wrapper that re-resolves its service by identity after the held
/// endpoint terminates.
pub struct ServiceHandleProxy {
    id: ServiceId,
    directory: Arc<DirectoryClient>,
    endpoint: RwLock<Option<EndpointRef>>,
    /// Serializes re-resolution so concurrent callers adopt one endpoint.
    reresolve_lock: Mutex<()>,
    me: Weak<ServiceHandleProxy>,
}

impl ServiceHandleProxy {
    /// Wrap a raw endpoint just obtained from the directory.
    ///
    /// Endpoints the oracle places in this process are returned unwrapped and
    /// no termination listener is registered for them.
    pub fn wrap(
        id: ServiceId,
        raw: EndpointRef,
        directory: Arc<DirectoryClient>,
        oracle: &dyn ProcessOracle,
    ) -> Wrapped {
        if oracle.is_same_process(&raw) {
            debug!("Service {} is local to this process, not wrapping", id);
            return Wrapped::Direct(raw);
        }

        let proxy = Arc::new_cyclic(|me| Self {
            id,
            directory,
            endpoint: RwLock::new(None),
            reresolve_lock: Mutex::new(()),
            me: me.clone(),
        });
        proxy.adopt(&raw);
        Wrapped::Proxied(proxy)
    }

    pub fn service_id(&self) -> ServiceId {
        self.id
    }

    /// True while an endpoint is held, i.e. no termination has been seen since
    /// the last successful resolution.
    pub fn has_endpoint(&self) -> bool {
        self.endpoint.read().is_some()
    }

    /// The live endpoint to forward to, re-resolving by identity if none is
    /// held.
    ///
    /// Fails with [`LocatorError::EndpointUnavailable`] when the directory is
    /// unreachable or no longer knows the service. Nothing is latched; the
    /// next call tries again.
    pub fn current(&self) -> Result<EndpointRef> {
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            return Ok(Arc::clone(endpoint));
        }

        let _guard = self.reresolve_lock.lock();
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            return Ok(Arc::clone(endpoint));
        }

        match self.directory.raw_service(self.id) {
            Some(endpoint) if self.adopt(&endpoint) => {
                info!("Service {} re-resolved", self.id);
                Ok(endpoint)
            }
            Some(_) => Err(LocatorError::EndpointUnavailable { service_id: self.id }),
            None => {
                debug!("Service {} could not be re-resolved", self.id);
                Err(LocatorError::EndpointUnavailable { service_id: self.id })
            }
        }
    }

    /// Store `endpoint` and link to it. Returns false, holding nothing, when
    /// the endpoint cannot be watched or terminates while being linked.
    ///
    /// The endpoint is stored first so that a termination notice delivered
    /// during the link finds it and clears it.
    fn adopt(&self, endpoint: &EndpointRef) -> bool {
        *self.endpoint.write() = Some(Arc::clone(endpoint));

        if let Err(e) = endpoint.link_to_death(self.recipient()) {
            warn!("Failed to watch endpoint of service {}: {}", self.id, e);
            self.forget(endpoint);
            return false;
        }
        let held = self
            .endpoint
            .read()
            .as_ref()
            .is_some_and(|e| Arc::ptr_eq(e, endpoint));
        if !held {
            debug!("Endpoint of service {} died while being linked", self.id);
        }
        held
    }

    fn forget(&self, endpoint: &EndpointRef) {
        let mut held = self.endpoint.write();
        if held.as_ref().is_some_and(|e| Arc::ptr_eq(e, endpoint)) {
            *held = None;
        }
    }

    fn recipient(&self) -> Weak<dyn DeathRecipient> {
        self.me.clone()
    }
}

impl DeathRecipient for ServiceHandleProxy {
    fn endpoint_died(&self, endpoint: &dyn RemoteEndpoint) {
        let mut held = self.endpoint.write();
        let current = held
            .as_ref()
            .is_some_and(|e| same_endpoint(e.as_ref(), endpoint));
        if current {
            *held = None;
            info!("Endpoint of service {} died, will re-resolve on next use", self.id);
        }
    }
}

impl RemoteEndpoint for ServiceHandleProxy {
    fn interface_descriptor(&self) -> Result<String> {
        self.current()?.interface_descriptor()
    }

    fn ping(&self) -> bool {
        self.current().map(|e| e.ping()).unwrap_or(false)
    }

    fn is_alive(&self) -> bool {
        self.current().map(|e| e.is_alive()).unwrap_or(false)
    }

    fn query_local_interface(&self, descriptor: &str) -> Option<LocalObject> {
        self.current().ok()?.query_local_interface(descriptor)
    }

    fn transact(&self, code: u32, data: &[u8], mode: CallMode) -> Result<Vec<u8>> {
        self.current()?.transact(code, data, mode)
    }

    fn link_to_death(&self, recipient: Weak<dyn DeathRecipient>) -> Result<()> {
        self.current()?.link_to_death(recipient)
    }

    fn unlink_to_death(&self, recipient: &Weak<dyn DeathRecipient>) -> bool {
        self.current()
            .map(|e| e.unlink_to_death(recipient))
            .unwrap_or(false)
    }

    fn dump(&self, out: &mut dyn Write, args: &[String]) -> Result<()> {
        self.current()?.dump(out, args)
    }
}

impl Drop for ServiceHandleProxy {
    fn drop(&mut self) {
        if let Some(endpoint) = self.endpoint.get_mut().take() {
            endpoint.unlink_to_death(&self.recipient());
        }
    }
}

impl fmt::Debug for ServiceHandleProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandleProxy")
            .field("id", &self.id)
            .field("endpoint", &*self.endpoint.read())
            .finish()
    }
}
