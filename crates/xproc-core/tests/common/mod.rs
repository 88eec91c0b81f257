//! In-memory fakes standing in for the transport and the directory process.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use xproc_locator::{
    CallMode, ConnectionRef, DeathRecipient, DeathRecipientList, DirectoryConnection,
    DirectoryConnector, DirectoryLookup, EndpointDescriptor, EndpointRef, LocalObject,
    LocatorError, RemoteEndpoint, Result, ServiceId, ServiceLocator,
};

/// Endpoint of a fake remote object. Echoes transactions until killed.
#[derive(Debug)]
pub struct FakeEndpoint {
    pub descriptor: String,
    deaths: DeathRecipientList,
    local: bool,
    fail_transact: AtomicBool,
    die_on_link: AtomicBool,
    pub pings: AtomicUsize,
    pub links: AtomicUsize,
}

impl FakeEndpoint {
    pub fn new(descriptor: &str) -> Arc<Self> {
        Arc::new(Self::build(descriptor, false))
    }

    /// Endpoint that claims to live in the caller's process.
    pub fn local(descriptor: &str) -> Arc<Self> {
        Arc::new(Self::build(descriptor, true))
    }

    fn build(descriptor: &str, local: bool) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            deaths: DeathRecipientList::new(),
            local,
            fail_transact: AtomicBool::new(false),
            die_on_link: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
            links: AtomicUsize::new(0),
        }
    }

    /// Terminate the endpoint and notify linked recipients.
    pub fn kill(&self) {
        self.deaths.notify(self);
    }

    /// Terminate as soon as the next listener has registered.
    pub fn die_on_next_link(&self) {
        self.die_on_link.store(true, Ordering::SeqCst);
    }

    pub fn fail_transactions(&self) {
        self.fail_transact.store(true, Ordering::SeqCst);
    }

    /// Currently registered termination listeners.
    pub fn listeners(&self) -> usize {
        self.deaths.len()
    }

    fn dead(&self) -> bool {
        self.deaths.is_dead()
    }
}

impl RemoteEndpoint for FakeEndpoint {
    fn interface_descriptor(&self) -> Result<String> {
        if self.dead() {
            return Err(LocatorError::DeadEndpoint {
                descriptor: self.descriptor.clone(),
            });
        }
        Ok(self.descriptor.clone())
    }

    fn ping(&self) -> bool {
        self.pings.fetch_add(1, Ordering::SeqCst);
        !self.dead()
    }

    fn is_alive(&self) -> bool {
        !self.dead()
    }

    fn query_local_interface(&self, descriptor: &str) -> Option<LocalObject> {
        (self.local && descriptor == self.descriptor).then(|| Arc::new(()) as LocalObject)
    }

    fn transact(&self, _code: u32, data: &[u8], mode: CallMode) -> Result<Vec<u8>> {
        if self.dead() {
            return Err(LocatorError::DeadEndpoint {
                descriptor: self.descriptor.clone(),
            });
        }
        if self.fail_transact.load(Ordering::SeqCst) {
            return Err(LocatorError::transport("connection reset by peer"));
        }
        match mode {
            CallMode::Blocking => Ok(data.to_vec()),
            CallMode::OneWay => Ok(Vec::new()),
        }
    }

    fn link_to_death(&self, recipient: Weak<dyn DeathRecipient>) -> Result<()> {
        self.deaths.link(recipient, &self.descriptor)?;
        self.links.fetch_add(1, Ordering::SeqCst);
        if self.die_on_link.swap(false, Ordering::SeqCst) {
            self.kill();
        }
        Ok(())
    }

    fn unlink_to_death(&self, recipient: &Weak<dyn DeathRecipient>) -> bool {
        self.deaths.unlink(recipient)
    }

    fn dump(&self, out: &mut dyn Write, _args: &[String]) -> Result<()> {
        writeln!(out, "{} dead={}", self.descriptor, self.dead())?;
        Ok(())
    }
}

/// The directory process: its own endpoint plus the identity table.
pub struct FakeDirectory {
    pub endpoint: Arc<FakeEndpoint>,
    services: Mutex<HashMap<ServiceId, EndpointRef>>,
    pub queries: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoint: FakeEndpoint::new("test.IServiceDirectory"),
            services: Mutex::new(HashMap::new()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn register(&self, id: u32, endpoint: Arc<FakeEndpoint>) {
        self.services.lock().insert(ServiceId::new(id), endpoint);
    }

    pub fn register_endpoint(&self, id: u32, endpoint: EndpointRef) {
        self.services.lock().insert(ServiceId::new(id), endpoint);
    }

    pub fn unregister(&self, id: u32) {
        self.services.lock().remove(&ServiceId::new(id));
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl DirectoryConnection for FakeDirectory {
    fn endpoint(&self) -> EndpointRef {
        self.endpoint.clone()
    }

    fn get_service(&self, id: ServiceId) -> Result<Option<EndpointRef>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.endpoint.dead() {
            return Err(LocatorError::DeadEndpoint {
                descriptor: self.endpoint.descriptor.clone(),
            });
        }
        Ok(self.services.lock().get(&id).cloned())
    }
}

/// Lookup provider that counts calls, optionally slowly or failing.
#[derive(Default)]
pub struct CountingLookup {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl CountingLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

impl DirectoryLookup for CountingLookup {
    fn locate(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LocatorError::Other("directory not published".into()));
        }
        EndpointDescriptor::new(
            "service-directory",
            std::process::id(),
            "fake:directory",
            "test.IServiceDirectory",
        )
        .to_bytes()
    }
}

/// Connector that hands out whichever fake directory is current.
pub struct FakeConnector {
    current: Mutex<Arc<FakeDirectory>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(directory: Arc<FakeDirectory>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(directory),
            connects: AtomicUsize::new(0),
        })
    }

    /// Simulate the directory process restarting.
    pub fn replace(&self, directory: Arc<FakeDirectory>) {
        *self.current.lock() = directory;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl DirectoryConnector for FakeConnector {
    fn connect(&self, descriptor: &EndpointDescriptor) -> Result<ConnectionRef> {
        assert_eq!(descriptor.address, "fake:directory");
        self.connects.fetch_add(1, Ordering::SeqCst);
        let directory = self.current.lock().clone();
        Ok(directory)
    }
}

/// A locator wired to fresh fakes.
pub struct Harness {
    pub locator: ServiceLocator,
    pub lookup: Arc<CountingLookup>,
    pub connector: Arc<FakeConnector>,
    pub directory: Arc<FakeDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        let lookup = CountingLookup::new();
        let directory = FakeDirectory::new();
        let connector = FakeConnector::new(directory.clone());
        let locator = ServiceLocator::builder()
            .shared_lookup(lookup.clone())
            .shared_connector(connector.clone())
            .build()
            .expect("locator should build");
        Self {
            locator,
            lookup,
            connector,
            directory,
        }
    }
}
