//! Remote endpoint primitives.
//!
//! A [`RemoteEndpoint`] is an opaque, transactable reference to code that runs
//! in some process (usually another one). The transport layer owns endpoints;
//! this crate only receives, wraps, and releases references to them.
//!
//! Termination notifications are delivered to [`DeathRecipient`]s. Endpoints
//! hold recipients weakly so that a recipient which also holds the endpoint
//! (as every proxy does) never forms a reference cycle.

use crate::error::{LocatorError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Weak};

/// Shared reference to an endpoint.
pub type EndpointRef = Arc<dyn RemoteEndpoint>;

/// An object living in the caller's own process, as returned by
/// [`RemoteEndpoint::query_local_interface`].
pub type LocalObject = Arc<dyn Any + Send + Sync>;

/// How a transaction waits for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Block until the reply arrives.
    #[default]
    Blocking,
    /// Fire and forget; the reply is empty.
    OneWay,
}

/// Receives termination notifications from endpoints it is linked to.
pub trait DeathRecipient: Send + Sync {
    /// Called once when `endpoint` terminates.
    ///
    /// Implementations must not block on re-resolution here.
    fn endpoint_died(&self, endpoint: &dyn RemoteEndpoint);
}

/// Callable endpoint capability set.
pub trait RemoteEndpoint: Send + Sync + fmt::Debug {
    /// Name of the interface implemented behind this endpoint.
    fn interface_descriptor(&self) -> Result<String>;

    /// Round-trip liveness check. `false` when the endpoint does not answer.
    fn ping(&self) -> bool;

    /// Cheap local liveness check, without a round trip.
    fn is_alive(&self) -> bool;

    /// Returns the in-process object behind this endpoint when it lives in the
    /// caller's own process and implements `descriptor`.
    fn query_local_interface(&self, descriptor: &str) -> Option<LocalObject>;

    /// Invoke `code` with an opaque request payload and return the reply.
    fn transact(&self, code: u32, data: &[u8], mode: CallMode) -> Result<Vec<u8>>;

    /// Register `recipient` for the termination notification of this endpoint.
    ///
    /// Fails with [`LocatorError::DeadEndpoint`] if the endpoint is already gone.
    fn link_to_death(&self, recipient: Weak<dyn DeathRecipient>) -> Result<()>;

    /// Remove a registration made with [`link_to_death`](Self::link_to_death).
    fn unlink_to_death(&self, recipient: &Weak<dyn DeathRecipient>) -> bool;

    /// Write a diagnostic dump of the remote object's state to `out`.
    fn dump(&self, out: &mut dyn Write, args: &[String]) -> Result<()>;
}

/// Identity comparison between endpoints, ignoring vtables.
pub fn same_endpoint(a: &dyn RemoteEndpoint, b: &dyn RemoteEndpoint) -> bool {
    std::ptr::addr_eq(a as *const dyn RemoteEndpoint, b as *const dyn RemoteEndpoint)
}

/// Registration list for endpoint implementations.
///
/// Transports keep one of these per endpoint and call
/// [`notify`](Self::notify) exactly once when the endpoint terminates. Later
/// registrations are refused.
#[derive(Default)]
pub struct DeathRecipientList {
    state: Mutex<RecipientState>,
}

#[derive(Default)]
struct RecipientState {
    dead: bool,
    recipients: Vec<Weak<dyn DeathRecipient>>,
}

impl DeathRecipientList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient. Fails once the owning endpoint has been notified dead.
    pub fn link(&self, recipient: Weak<dyn DeathRecipient>, descriptor: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.dead {
            return Err(LocatorError::DeadEndpoint {
                descriptor: descriptor.to_string(),
            });
        }
        state.recipients.push(recipient);
        Ok(())
    }

    /// Remove the first registration of `recipient`.
    pub fn unlink(&self, recipient: &Weak<dyn DeathRecipient>) -> bool {
        let mut state = self.state.lock();
        match state
            .recipients
            .iter()
            .position(|r| Weak::ptr_eq(r, recipient))
        {
            Some(pos) => {
                state.recipients.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.state.lock().recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dead(&self) -> bool {
        self.state.lock().dead
    }

    /// Mark the endpoint dead and deliver the notification.
    ///
    /// Recipients are called outside the internal lock, so they may call back
    /// into the endpoint. Returns the number of recipients reached; a second
    /// call delivers nothing.
    pub fn notify(&self, endpoint: &dyn RemoteEndpoint) -> usize {
        let recipients = {
            let mut state = self.state.lock();
            if state.dead {
                return 0;
            }
            state.dead = true;
            std::mem::take(&mut state.recipients)
        };

        let mut delivered = 0;
        for recipient in recipients.iter().filter_map(Weak::upgrade) {
            recipient.endpoint_died(endpoint);
            delivered += 1;
        }
        delivered
    }
}

impl fmt::Debug for DeathRecipientList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeathRecipientList")
            .field("dead", &state.dead)
            .field("recipients", &state.recipients.len())
            .finish()
    }
}

/// Published description of an endpoint, as handed out by a directory lookup
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Name the endpoint was published under.
    pub name: String,
    /// PID of the process hosting the endpoint.
    pub pid: u32,
    /// Transport-specific address.
    pub address: String,
    /// Interface implemented by the endpoint.
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl EndpointDescriptor {
    pub fn new(
        name: impl Into<String>,
        pid: u32,
        address: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pid,
            address: address.into(),
            interface: interface.into(),
            published_at: None,
        }
    }

    /// Serialize to the byte form returned by lookup providers.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse the byte form returned by lookup providers.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let descriptor: EndpointDescriptor = serde_json::from_slice(bytes)?;
        if descriptor.address.is_empty() {
            return Err(LocatorError::Descriptor {
                message: format!("descriptor '{}' has an empty address", descriptor.name),
                source: None,
            });
        }
        Ok(descriptor)
    }
}
