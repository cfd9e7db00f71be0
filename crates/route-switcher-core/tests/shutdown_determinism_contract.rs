//! Architectural Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - The switcher terminates once the token is cancelled
//! - Every monitor exits and closes its prober
//! - The installed route is left in place
//! - A failing monitor does not take the switcher down
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Route cleanup on exit

mod common;

use common::*;
use route_switcher_core::config::RoutePreference;
use route_switcher_core::traits::{LinkResolver, ProberFactory, RouteInstaller};
use route_switcher_core::{CandidateRoute, Result, RouteSwitcher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn switcher(
    resolver: StaticLinkResolver,
    factory: &ScriptedProberFactory,
    installer: Box<dyn RouteInstaller>,
) -> RouteSwitcher {
    let (switcher, _event_rx) = RouteSwitcher::new(
        fast_config(2, RoutePreference::Single),
        Arc::new(resolver) as Arc<dyn LinkResolver>,
        Arc::new(factory.clone()) as Arc<dyn ProberFactory>,
        installer,
    )
    .await
    .expect("switcher construction succeeds");
    switcher
}

#[tokio::test(start_paused = true)]
async fn cancellation_terminates_every_task() {
    let factory = ScriptedProberFactory::new();
    let installer = MockRouteInstaller::new();
    let switcher = switcher(
        StaticLinkResolver::with_paths(2),
        &factory,
        Box::new(MockRouteInstaller::sharing_counters_with(&installer)),
    )
    .await;

    let token = CancellationToken::new();
    let handle = tokio::spawn(switcher.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "Switcher should terminate within 5 seconds");
    let run_result = result.unwrap().unwrap();
    assert!(run_result.is_ok(), "Switcher should shut down cleanly: {:?}", run_result);

    let mut bound = factory.bound_sources();
    bound.sort();
    assert_eq!(bound, vec![local_address(0), local_address(1)]);
    assert_eq!(factory.closed_count(), 2, "every prober is closed");
    assert!(factory.round_count() > 0);
}

#[tokio::test(start_paused = true)]
async fn installed_route_survives_shutdown() {
    let factory = ScriptedProberFactory::new();
    let installer = MockRouteInstaller::new();
    let switcher = switcher(
        StaticLinkResolver::with_paths(2),
        &factory,
        Box::new(MockRouteInstaller::sharing_counters_with(&installer)),
    )
    .await;

    let token = CancellationToken::new();
    let handle = tokio::spawn(switcher.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let calls = installer.calls();
    assert_eq!(calls.len(), 1, "one install, no removal on exit: {:?}", calls);
    assert!(matches!(&calls[0], Call::Install(route) if gateways(route) == vec![gateway(0)]));
}

#[tokio::test(start_paused = true)]
async fn failing_monitor_does_not_stop_the_switcher() {
    // eth1 exists but carries no IPv4 address
    let resolver = StaticLinkResolver::with_paths(2).with_link("eth1", 3, Vec::new());
    let factory = ScriptedProberFactory::new();
    let installer = MockRouteInstaller::new();
    let switcher = switcher(
        resolver,
        &factory,
        Box::new(MockRouteInstaller::sharing_counters_with(&installer)),
    )
    .await;
    let registry = switcher.registry().clone();

    let token = CancellationToken::new();
    let handle = tokio::spawn(switcher.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(4500)).await;

    let eth1 = registry.get(1).unwrap().statistic().health();
    assert!(!eth1.is_usable(), "path without address stays excluded");
    assert!(registry.get(0).unwrap().statistic().health().is_usable());

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.unwrap().unwrap().is_ok());

    assert_eq!(factory.bound_sources(), vec![local_address(0)]);
    assert_eq!(factory.closed_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_install() {
    struct SlowInstaller {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl RouteInstaller for SlowInstaller {
        async fn install(&self, _route: &CandidateRoute) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remove(&self, _route: &CandidateRoute) -> Result<()> {
            Ok(())
        }

        fn installer_name(&self) -> &'static str {
            "slow"
        }
    }

    let completed = Arc::new(AtomicUsize::new(0));
    let factory = ScriptedProberFactory::new();
    let switcher = switcher(
        StaticLinkResolver::with_paths(2),
        &factory,
        Box::new(SlowInstaller {
            completed: Arc::clone(&completed),
        }),
    )
    .await;

    let token = CancellationToken::new();
    let handle = tokio::spawn(switcher.run(token.clone()));

    // First tick at 1s; cancel while the install is in flight
    tokio::time::sleep(Duration::from_millis(1100)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "Switcher should still terminate");
    assert_eq!(completed.load(Ordering::SeqCst), 1, "install is never torn in half");
}

#[tokio::test]
async fn cancelling_before_run_returns_immediately() {
    let factory = ScriptedProberFactory::new();
    let switcher = switcher(
        StaticLinkResolver::with_paths(2),
        &factory,
        Box::new(MockRouteInstaller::new()),
    )
    .await;

    let token = CancellationToken::new();
    token.cancel();
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), switcher.run(token)).await;
    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());
}
