//! Directory lookup providers.
//!
//! The locator only needs something implementing
//! [`DirectoryLookup`](crate::directory::DirectoryLookup). This module ships the
//! default, a same-host SQLite table the directory process publishes into.

mod registry;

pub use registry::RegistryLookup;
