//! Contract Test: Health Monitor
//!
//! Verifies that a monitor only accumulates counters and fails in isolation.
//!
//! Constraints verified:
//! - Every completed round adds `sent = targets` and the replies seen
//! - A failed round counts as every probe lost
//! - Probes are sent from the interface's first IPv4 address
//! - Missing address or unbindable prober ends the monitor without traffic

mod common;

use common::*;
use route_switcher_core::config::ProbeConfig;
use route_switcher_core::error::Error;
use route_switcher_core::stats::ProbeWindow;
use route_switcher_core::traits::{LinkResolver, ProberFactory};
use route_switcher_core::HealthMonitor;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn probe_config() -> ProbeConfig {
    ProbeConfig {
        max_rtt_ms: 5,
        round_interval_ms: 10,
    }
}

fn targets() -> Arc<[Ipv4Addr]> {
    vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)].into()
}

/// Run a monitor for path 0 for `duration`, then stop it
async fn run_monitor(
    resolver: StaticLinkResolver,
    factory: &ScriptedProberFactory,
    duration: Duration,
) -> (route_switcher_core::Result<()>, ProbeWindow) {
    let registry = registry(2);
    let entry = registry.get(0).unwrap().clone();
    let monitor = HealthMonitor::new(
        entry,
        Arc::new(resolver) as Arc<dyn LinkResolver>,
        Arc::new(factory.clone()) as Arc<dyn ProberFactory>,
        targets(),
        probe_config(),
    );

    let token = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(token.clone()));

    tokio::time::sleep(duration).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor stops")
        .expect("monitor task does not panic");

    (result, registry.get(0).unwrap().statistic().current_window())
}

#[tokio::test(start_paused = true)]
async fn rounds_accumulate_sent_and_received() {
    let factory = ScriptedProberFactory::new();
    let (result, window) =
        run_monitor(StaticLinkResolver::with_paths(2), &factory, Duration::from_millis(105)).await;

    assert_ok!(result);
    assert!(factory.round_count() >= 5);
    assert_eq!(window.sent, 2 * factory.round_count());
    assert_eq!(window.received, window.sent);
    assert_eq!(factory.bound_sources(), vec![local_address(0)]);
    assert_eq!(factory.closed_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn partial_replies_are_counted() {
    let factory = ScriptedProberFactory::new();
    factory.set_replies(local_address(0), 1);

    let (result, window) =
        run_monitor(StaticLinkResolver::with_paths(2), &factory, Duration::from_millis(105)).await;

    assert_ok!(result);
    assert!(window.sent > 0);
    assert_eq!(window.received * 2, window.sent);
}

#[tokio::test(start_paused = true)]
async fn failed_round_counts_every_probe_as_lost() {
    let factory = ScriptedProberFactory::new();
    factory.fail_rounds(local_address(0));

    let (result, window) =
        run_monitor(StaticLinkResolver::with_paths(2), &factory, Duration::from_millis(105)).await;

    assert_ok!(result);
    assert_eq!(window.sent, 2 * factory.round_count());
    assert_eq!(window.received, 0);
}

#[tokio::test(start_paused = true)]
async fn first_address_is_the_probe_source() {
    let resolver = StaticLinkResolver::with_paths(2).with_link(
        "eth0",
        2,
        vec![Ipv4Addr::new(192, 168, 7, 2), Ipv4Addr::new(192, 168, 7, 3)],
    );
    let factory = ScriptedProberFactory::new();

    let (result, _) = run_monitor(resolver, &factory, Duration::from_millis(25)).await;

    assert_ok!(result);
    assert_eq!(factory.bound_sources(), vec![Ipv4Addr::new(192, 168, 7, 2)]);
}

#[tokio::test(start_paused = true)]
async fn interface_without_address_never_probes() {
    let resolver = StaticLinkResolver::with_paths(2).with_link("eth0", 2, Vec::new());
    let factory = ScriptedProberFactory::new();

    let (result, window) = run_monitor(resolver, &factory, Duration::from_millis(50)).await;

    let err = assert_err!(result);
    assert!(matches!(err, Error::NoAddress(ref name) if name == "eth0"));
    assert_eq!(window, ProbeWindow::default());
    assert!(factory.bound_sources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbindable_prober_never_probes() {
    let factory = ScriptedProberFactory::new();
    factory.fail_bind();

    let (result, window) =
        run_monitor(StaticLinkResolver::with_paths(2), &factory, Duration::from_millis(50)).await;

    let err = assert_err!(result);
    assert!(matches!(err, Error::Probe(_)));
    assert_eq!(window, ProbeWindow::default());
    assert_eq!(factory.round_count(), 0);
}
