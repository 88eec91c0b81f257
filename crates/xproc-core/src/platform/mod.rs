//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the locator.
//!
//! - `paths` - Config directory and registry database location
//! - `process` - Process liveness checks

pub mod paths;
pub mod process;

pub use paths::{locator_config_dir, registry_db_path};
pub use process::{current_pid, is_process_alive};
