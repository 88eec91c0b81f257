//! In-process endpoints.
//!
//! A [`LocalEndpoint`] exposes an object of this process through the
//! [`RemoteEndpoint`] capability set. Such endpoints never terminate while
//! referenced, so the locator hands them out without a proxy.

use crate::endpoint::{CallMode, DeathRecipient, LocalObject, RemoteEndpoint};
use crate::error::Result;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Weak};

/// Service implementation hosted in this process.
pub trait ServiceObject: Send + Sync + 'static {
    /// Interface descriptor this object implements.
    fn descriptor(&self) -> &str;

    /// Handle a transaction.
    fn on_transact(&self, code: u32, data: &[u8]) -> Result<Vec<u8>>;

    fn dump(&self, out: &mut dyn Write, _args: &[String]) -> Result<()> {
        writeln!(out, "{}", self.descriptor())?;
        Ok(())
    }
}

/// Endpoint backed by an in-process [`ServiceObject`].
pub struct LocalEndpoint {
    object: Arc<dyn ServiceObject>,
    local: LocalObject,
}

impl LocalEndpoint {
    pub fn new<T: ServiceObject>(object: Arc<T>) -> Self {
        Self {
            local: Arc::clone(&object) as LocalObject,
            object,
        }
    }
}

impl RemoteEndpoint for LocalEndpoint {
    fn interface_descriptor(&self) -> Result<String> {
        Ok(self.object.descriptor().to_string())
    }

    fn ping(&self) -> bool {
        true
    }

    fn is_alive(&self) -> bool {
        true
    }

    fn query_local_interface(&self, descriptor: &str) -> Option<LocalObject> {
        (descriptor == self.object.descriptor()).then(|| Arc::clone(&self.local))
    }

    fn transact(&self, code: u32, data: &[u8], mode: CallMode) -> Result<Vec<u8>> {
        let reply = self.object.on_transact(code, data)?;
        match mode {
            CallMode::Blocking => Ok(reply),
            CallMode::OneWay => Ok(Vec::new()),
        }
    }

    // Never fires: the object lives as long as this endpoint.
    fn link_to_death(&self, _recipient: Weak<dyn DeathRecipient>) -> Result<()> {
        Ok(())
    }

    fn unlink_to_death(&self, _recipient: &Weak<dyn DeathRecipient>) -> bool {
        true
    }

    fn dump(&self, out: &mut dyn Write, args: &[String]) -> Result<()> {
        self.object.dump(out, args)
    }
}

impl fmt::Debug for LocalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEndpoint")
            .field("descriptor", &self.object.descriptor())
            .finish()
    }
}
