//! Centralized configuration for the service locator.
//!
//! Compile-time constants live on unit structs; runtime options that callers
//! may load from a file are plain serde structs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry (directory lookup store) configuration.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Directory under the platform config dir holding the registry database.
    pub const APP_CONFIG_DIR_NAME: &'static str = "xproc";
    pub const DB_FILENAME: &'static str = "directory.db";
    pub const BUSY_TIMEOUT_MS: u32 = 5000;
    /// Name the directory process publishes itself under unless told otherwise.
    pub const DEFAULT_DIRECTORY_NAME: &'static str = "service-directory";
}

/// Runtime options for the default in-memory service cache.
///
/// The default is unbounded with no idle expiry: entries are only ever
/// replaced, never evicted, unless the caller opts into a policy here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCacheConfig {
    /// Upper bound on cached handles.
    pub max_capacity: Option<u64>,
    /// Drop entries not read for this long.
    #[serde(with = "duration_secs")]
    pub time_to_idle: Option<Duration>,
}

impl ServiceCacheConfig {
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    pub fn with_time_to_idle(mut self, time_to_idle: Duration) -> Self {
        self.time_to_idle = Some(time_to_idle);
        self
    }

    /// True when neither a capacity bound nor an idle expiry is configured.
    pub fn is_unbounded(&self) -> bool {
        self.max_capacity.is_none() && self.time_to_idle.is_none()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
