//! xproc-locator - Cross-process service locator.
//!
//! Callers resolve a service by its integer identity and get back a handle
//! they can call without managing the connection behind it. The locator
//! connects to the service directory lazily (one attempt at a time), caches
//! every resolved handle, and wraps remote endpoints in proxies that
//! re-resolve by identity once the endpoint they hold terminates.
//!
//! The transport is supplied by the caller through
//! [`DirectoryConnector`]; the directory's address is found through a
//! [`DirectoryLookup`], by default the same-host SQLite
//! [`RegistryLookup`](lookup::RegistryLookup).
//!
//! # Example
//!
//! ```rust,ignore
//! use xproc_locator::{ServiceId, ServiceLocator};
//! use xproc_locator::lookup::RegistryLookup;
//!
//! fn main() -> xproc_locator::Result<()> {
//!     let locator = ServiceLocator::builder()
//!         .lookup(RegistryLookup::open()?)
//!         .connector(MyTransport::default())
//!         .build()?;
//!
//!     match locator.resolve(ServiceId::new(7)) {
//!         Some(handle) => println!("service 7 alive: {}", handle.ping()),
//!         None => println!("service 7 unavailable"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod directory;
pub mod endpoint;
pub mod error;
pub mod handle;
pub mod identity;
pub mod local;
pub mod locator;
pub mod lookup;
pub mod oracle;
pub mod platform;
pub mod proxy;

// Re-export commonly used types
pub use builder::ServiceLocatorBuilder;
pub use cache::{MemoryServiceCache, ServiceCache};
pub use config::{RegistryConfig, ServiceCacheConfig};
pub use directory::{
    ConnectionRef, DirectoryClient, DirectoryConnection, DirectoryConnector, DirectoryLookup,
};
pub use endpoint::{
    same_endpoint, CallMode, DeathRecipient, DeathRecipientList, EndpointDescriptor, EndpointRef,
    LocalObject, RemoteEndpoint,
};
pub use error::{LocatorError, Result};
pub use handle::{FromEndpoint, ServiceHandle};
pub use identity::ServiceId;
pub use local::{LocalEndpoint, ServiceObject};
pub use locator::ServiceLocator;
pub use oracle::{AlwaysRemote, LocalInterfaceOracle, ProcessOracle};
pub use proxy::{ServiceHandleProxy, Wrapped};
