//! Integration tests for endpoint termination and re-resolution.

mod common;

use common::{FakeDirectory, FakeEndpoint, Harness};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use xproc_locator::{
    same_endpoint, CallMode, DeathRecipient, LocatorError, RemoteEndpoint, ServiceId,
};

#[test]
fn test_terminated_endpoint_is_replaced_on_next_call() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());

    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let proxy = handle.proxy().unwrap().clone();
    assert_eq!(harness.directory.queries(), 1);

    let replacement = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, replacement.clone());
    original.kill();
    assert!(!proxy.has_endpoint());

    assert!(handle.ping());
    assert_eq!(harness.directory.queries(), 2);
    assert!(proxy.has_endpoint());
    assert_eq!(replacement.pings.load(Ordering::SeqCst), 1);
    assert_eq!(replacement.listeners(), 1);

    // Subsequent calls use the adopted endpoint.
    assert!(handle.ping());
    assert_eq!(handle.transact(2, b"again", CallMode::Blocking).unwrap(), b"again");
    assert_eq!(harness.directory.queries(), 2);
}

#[test]
fn test_terminated_endpoint_with_unknown_service() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());

    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let proxy = handle.proxy().unwrap().clone();

    harness.directory.unregister(7);
    original.kill();

    assert!(!handle.ping());
    assert!(!proxy.has_endpoint());
    assert_eq!(harness.directory.queries(), 2);

    let err = handle.transact(1, b"x", CallMode::Blocking).unwrap_err();
    assert!(matches!(
        err,
        LocatorError::EndpointUnavailable { service_id } if service_id == ServiceId::new(7)
    ));
    assert!(!proxy.has_endpoint());
    assert_eq!(harness.directory.queries(), 3);

    // No failure latch: the service coming back is picked up.
    harness.directory.register(7, FakeEndpoint::new("demo.IEcho"));
    assert!(handle.ping());
    assert!(proxy.has_endpoint());
}

#[test]
fn test_unavailable_queries_report_false_or_none() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());
    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();

    harness.directory.unregister(7);
    original.kill();

    assert!(!handle.is_alive());
    assert!(handle.query_local_interface("demo.IEcho").is_none());
    let nobody: Weak<dyn DeathRecipient> = Weak::<Watcher>::new();
    assert!(!handle.unlink_to_death(&nobody));
    assert!(handle.interface_descriptor().unwrap_err().is_resolution_failure());

    let mut out = Vec::new();
    assert!(handle.dump(&mut out, &[]).is_err());
    assert!(out.is_empty());
}

#[test]
fn test_transport_faults_pass_through() {
    let harness = Harness::new();
    let flaky = FakeEndpoint::new("demo.IEcho");
    flaky.fail_transactions();
    harness.directory.register(7, flaky.clone());

    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let err = handle.transact(1, b"x", CallMode::Blocking).unwrap_err();
    assert!(err.is_transport_fault());
    assert!(err.to_string().contains("connection reset"));

    // A fault is not a termination; nothing was re-resolved.
    assert_eq!(harness.directory.queries(), 1);
    assert!(handle.proxy().unwrap().has_endpoint());
}

#[test]
fn test_stale_termination_notice_is_ignored() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());
    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let proxy = handle.proxy().unwrap().clone();

    let replacement = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, replacement.clone());
    original.kill();
    assert!(handle.ping());

    // A late notice about the old endpoint must not drop the new one.
    proxy.endpoint_died(original.as_ref());
    assert!(proxy.has_endpoint());
    let current = proxy.current().unwrap();
    assert!(same_endpoint(current.as_ref(), replacement.as_ref()));
}

#[test]
fn test_dropping_proxy_releases_registration() {
    let harness = Harness::new();
    let echo = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, echo.clone());

    let handle = harness.locator.fetch(ServiceId::new(7)).unwrap();
    assert_eq!(echo.listeners(), 1);
    drop(handle);
    assert_eq!(echo.listeners(), 0);
}

#[test]
fn test_reresolution_reconnects_dead_directory() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());
    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();

    // The directory process restarts and the service comes back with it.
    let restarted = FakeDirectory::new();
    let replacement = FakeEndpoint::new("demo.IEcho");
    restarted.register(7, replacement.clone());
    harness.connector.replace(restarted.clone());
    harness.directory.endpoint.kill();
    original.kill();

    assert!(handle.ping());
    assert_eq!(harness.lookup.calls(), 2);
    assert_eq!(restarted.queries(), 1);
    assert_eq!(replacement.pings.load(Ordering::SeqCst), 1);
}

#[test]
fn test_forwarded_death_registration() {
    let harness = Harness::new();
    let echo = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, echo.clone());
    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();

    let watcher = Arc::new(Watcher::default());
    let weak: Weak<dyn DeathRecipient> = Arc::downgrade(&watcher) as Weak<dyn DeathRecipient>;
    handle.link_to_death(weak.clone()).unwrap();
    assert_eq!(echo.listeners(), 2);

    echo.kill();
    assert_eq!(watcher.deaths.load(Ordering::SeqCst), 1);
}

#[test]
fn test_endpoint_dying_while_wrapped_is_not_held() {
    let harness = Harness::new();
    let dying = FakeEndpoint::new("demo.IEcho");
    dying.die_on_next_link();
    harness.directory.register(7, dying.clone());

    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let proxy = handle.proxy().unwrap().clone();
    assert!(!proxy.has_endpoint());
    assert!(!dying.is_alive());

    let replacement = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, replacement.clone());
    assert!(handle.ping());
    assert!(proxy.has_endpoint());
    assert_eq!(replacement.pings.load(Ordering::SeqCst), 1);
    assert_eq!(harness.directory.queries(), 2);
}

#[test]
fn test_endpoint_dying_while_readopted_is_not_held() {
    let harness = Harness::new();
    let original = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, original.clone());
    let handle = harness.locator.resolve(ServiceId::new(7)).unwrap();
    let proxy = handle.proxy().unwrap().clone();

    let dying = FakeEndpoint::new("demo.IEcho");
    dying.die_on_next_link();
    harness.directory.register(7, dying.clone());
    original.kill();

    assert!(!handle.ping());
    assert!(!proxy.has_endpoint());
    assert_eq!(dying.pings.load(Ordering::SeqCst), 0);
    let err = handle.transact(1, b"x", CallMode::Blocking).unwrap_err();
    assert!(err.is_resolution_failure());

    let healthy = FakeEndpoint::new("demo.IEcho");
    harness.directory.register(7, healthy.clone());
    assert!(handle.ping());
    let current = proxy.current().unwrap();
    assert!(same_endpoint(current.as_ref(), healthy.as_ref()));
}

#[derive(Default)]
struct Watcher {
    deaths: std::sync::atomic::AtomicUsize,
}

impl DeathRecipient for Watcher {
    fn endpoint_died(&self, endpoint: &dyn RemoteEndpoint) {
        assert!(!endpoint.is_alive());
        self.deaths.fetch_add(1, Ordering::SeqCst);
    }
}
