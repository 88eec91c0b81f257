//! Service identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer key naming a service within the directory.
///
/// Identities are stable for the lifetime of a directory and are never reused
/// for an unrelated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(u32);

impl ServiceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ServiceId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
