//! Caller-facing view of a resolved service.

use crate::endpoint::{CallMode, DeathRecipient, EndpointRef, LocalObject};
use crate::error::Result;
use crate::identity::ServiceId;
use crate::proxy::{ServiceHandleProxy, Wrapped};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Weak};

/// A resolved service: its identity plus the endpoint to call, which is either
/// a [`ServiceHandleProxy`] or an in-process endpoint.
///
/// Cloning is cheap and clones share the endpoint.
#[derive(Clone)]
pub struct ServiceHandle {
    id: ServiceId,
    endpoint: EndpointRef,
    proxy: Option<Arc<ServiceHandleProxy>>,
}

impl ServiceHandle {
    /// Handle over an endpoint used without a proxy.
    pub fn direct(id: ServiceId, endpoint: EndpointRef) -> Self {
        Self {
            id,
            endpoint,
            proxy: None,
        }
    }

    pub(crate) fn from_wrapped(id: ServiceId, wrapped: Wrapped) -> Self {
        Self {
            id,
            endpoint: wrapped.endpoint(),
            proxy: wrapped.proxy().cloned(),
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn endpoint(&self) -> &EndpointRef {
        &self.endpoint
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    pub fn proxy(&self) -> Option<&Arc<ServiceHandleProxy>> {
        self.proxy.as_ref()
    }

    /// True when both handles forward to the same endpoint object.
    pub fn same_endpoint(&self, other: &ServiceHandle) -> bool {
        Arc::ptr_eq(&self.endpoint, &other.endpoint)
    }

    /// Adapt into a typed interface.
    pub fn into_interface<T: FromEndpoint>(self) -> Result<T> {
        T::from_endpoint(self.endpoint)
    }

    pub fn interface_descriptor(&self) -> Result<String> {
        self.endpoint.interface_descriptor()
    }

    pub fn ping(&self) -> bool {
        self.endpoint.ping()
    }

    pub fn is_alive(&self) -> bool {
        self.endpoint.is_alive()
    }

    pub fn query_local_interface(&self, descriptor: &str) -> Option<LocalObject> {
        self.endpoint.query_local_interface(descriptor)
    }

    pub fn transact(&self, code: u32, data: &[u8], mode: CallMode) -> Result<Vec<u8>> {
        self.endpoint.transact(code, data, mode)
    }

    pub fn link_to_death(&self, recipient: Weak<dyn DeathRecipient>) -> Result<()> {
        self.endpoint.link_to_death(recipient)
    }

    pub fn unlink_to_death(&self, recipient: &Weak<dyn DeathRecipient>) -> bool {
        self.endpoint.unlink_to_death(recipient)
    }

    pub fn dump(&self, out: &mut dyn Write, args: &[String]) -> Result<()> {
        self.endpoint.dump(out, args)
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("id", &self.id)
            .field("proxy", &self.is_proxy())
            .finish()
    }
}

/// Typed-interface adapter over an endpoint.
///
/// Conversions are pure; they fail only when the endpoint does not look like
/// the interface (typically a descriptor mismatch).
pub trait FromEndpoint: Sized {
    fn from_endpoint(endpoint: EndpointRef) -> Result<Self>;
}

impl FromEndpoint for EndpointRef {
    fn from_endpoint(endpoint: EndpointRef) -> Result<Self> {
        Ok(endpoint)
    }
}
