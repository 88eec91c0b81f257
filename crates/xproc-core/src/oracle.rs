//! Same-process detection.

use crate::endpoint::EndpointRef;
use tracing::debug;

/// Decides whether an endpoint is an object living in the caller's own
/// process.
pub trait ProcessOracle: Send + Sync {
    fn is_same_process(&self, endpoint: &EndpointRef) -> bool;
}

/// Treats an endpoint as in-process when it hands out a local object for its
/// own interface descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInterfaceOracle;

impl ProcessOracle for LocalInterfaceOracle {
    fn is_same_process(&self, endpoint: &EndpointRef) -> bool {
        match endpoint.interface_descriptor() {
            Ok(descriptor) => endpoint.query_local_interface(&descriptor).is_some(),
            Err(e) => {
                debug!("Interface descriptor query failed, assuming remote: {}", e);
                false
            }
        }
    }
}

/// Oracle that never reports an endpoint as local, forcing every handle
/// through a proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRemote;

impl ProcessOracle for AlwaysRemote {
    fn is_same_process(&self, _endpoint: &EndpointRef) -> bool {
        false
    }
}
