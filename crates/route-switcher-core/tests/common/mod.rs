//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles for the platform boundaries
//! (interfaces, probing, routing table) so the core can be driven without
//! touching the host.

#![allow(dead_code)]

use route_switcher_core::config::{PathConfig, RoutePreference, SwitcherConfig};
use route_switcher_core::error::{Error, Result};
use route_switcher_core::registry::{Path, PathRegistry};
use route_switcher_core::route::CandidateRoute;
use route_switcher_core::traits::{
    InterfaceHandle, LinkResolver, ProbeReply, ProbeRound, Prober, ProberFactory, RouteInstaller,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gateway of the n-th test path
pub fn gateway(n: usize) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, n as u8, 1)
}

/// Local address of the n-th test path
pub fn local_address(n: usize) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, n as u8, 100)
}

/// Interface name of the n-th test path
pub fn interface(n: usize) -> String {
    format!("eth{}", n)
}

/// Registry of `count` paths eth0..ethN with ifindex n+2
pub fn registry(count: usize) -> PathRegistry {
    PathRegistry::from_paths(
        (0..count).map(|n| Path::new(InterfaceHandle::new(n as u32 + 2, interface(n)), gateway(n))),
    )
}

/// Configuration matching `registry(count)`
pub fn config(count: usize, preference: RoutePreference) -> SwitcherConfig {
    let mut config = SwitcherConfig::new(
        (0..count).map(|n| PathConfig::new(interface(n), gateway(n))).collect(),
        vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)],
    );
    config.route_preference = preference;
    config
}

/// Configuration with millisecond-scale timings for run-loop tests
pub fn fast_config(count: usize, preference: RoutePreference) -> SwitcherConfig {
    let mut config = config(count, preference);
    config.controller.tick_interval_secs = 1;
    config.probe.max_rtt_ms = 5;
    config.probe.round_interval_ms = 10;
    config
}

/// Put one window's worth of counters on path `n`
pub fn feed(registry: &PathRegistry, n: usize, sent: u64, received: u64) {
    registry
        .get(n)
        .expect("path exists")
        .statistic()
        .record_round(sent, received);
}

/// Gateways of a route's next-hops, in order
pub fn gateways(route: &CandidateRoute) -> Vec<Ipv4Addr> {
    route.next_hops.iter().map(|h| h.gateway).collect()
}

/// A link resolver backed by a fixed table
#[derive(Default)]
pub struct StaticLinkResolver {
    links: HashMap<String, (u32, Vec<Ipv4Addr>)>,
    lookup_call_count: Arc<AtomicUsize>,
}

impl StaticLinkResolver {
    /// Resolver knowing eth0..ethN, each with one address
    pub fn with_paths(count: usize) -> Self {
        let mut resolver = Self::default();
        for n in 0..count {
            resolver = resolver.with_link(&interface(n), n as u32 + 2, vec![local_address(n)]);
        }
        resolver
    }

    /// Add or replace a link
    pub fn with_link(mut self, name: &str, index: u32, addresses: Vec<Ipv4Addr>) -> Self {
        self.links.insert(name.to_string(), (index, addresses));
        self
    }

    /// Get the number of times lookup_interface() was called
    pub fn lookup_call_count(&self) -> usize {
        self.lookup_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LinkResolver for StaticLinkResolver {
    async fn lookup_interface(&self, name: &str) -> Result<InterfaceHandle> {
        self.lookup_call_count.fetch_add(1, Ordering::SeqCst);
        self.links
            .get(name)
            .map(|(index, _)| InterfaceHandle::new(*index, name))
            .ok_or_else(|| Error::link_not_found(name))
    }

    async fn addresses_of(&self, link: &InterfaceHandle) -> Result<Vec<Ipv4Addr>> {
        Ok(self
            .links
            .get(&link.name)
            .map(|(_, addresses)| addresses.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct ProberState {
    /// Replies per round, by source address (default: every target answers)
    replies: Mutex<HashMap<Ipv4Addr, usize>>,
    /// Sources whose rounds fail
    failing: Mutex<Vec<Ipv4Addr>>,
    bound: Mutex<Vec<Ipv4Addr>>,
    rounds: AtomicU64,
    closed: AtomicUsize,
    fail_bind: AtomicBool,
}

/// A prober factory whose probers answer according to a script
#[derive(Clone, Default)]
pub struct ScriptedProberFactory {
    state: Arc<ProberState>,
}

impl ScriptedProberFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rounds from `source` get `count` replies
    pub fn set_replies(&self, source: Ipv4Addr, count: usize) {
        self.state.replies.lock().unwrap().insert(source, count);
    }

    /// Make rounds from `source` fail with a probe error
    pub fn fail_rounds(&self, source: Ipv4Addr) {
        self.state.failing.lock().unwrap().push(source);
    }

    /// Make every bind() fail
    pub fn fail_bind(&self) {
        self.state.fail_bind.store(true, Ordering::SeqCst);
    }

    /// Sources bound so far
    pub fn bound_sources(&self) -> Vec<Ipv4Addr> {
        self.state.bound.lock().unwrap().clone()
    }

    /// Total rounds run across all probers
    pub fn round_count(&self) -> u64 {
        self.state.rounds.load(Ordering::SeqCst)
    }

    /// Number of probers closed
    pub fn closed_count(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProberFactory for ScriptedProberFactory {
    async fn bind(
        &self,
        source: Ipv4Addr,
        targets: Arc<[Ipv4Addr]>,
        max_rtt: Duration,
    ) -> Result<Box<dyn Prober>> {
        if self.state.fail_bind.load(Ordering::SeqCst) {
            return Err(Error::probe("permission denied"));
        }
        self.state.bound.lock().unwrap().push(source);
        Ok(Box::new(ScriptedProber {
            source,
            targets,
            max_rtt,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedProber {
    source: Ipv4Addr,
    targets: Arc<[Ipv4Addr]>,
    max_rtt: Duration,
    state: Arc<ProberState>,
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe_round(&mut self) -> Result<ProbeRound> {
        tokio::time::sleep(self.max_rtt).await;
        self.state.rounds.fetch_add(1, Ordering::SeqCst);

        if self.state.failing.lock().unwrap().contains(&self.source) {
            return Err(Error::probe("network unreachable"));
        }

        let answered = self
            .state
            .replies
            .lock()
            .unwrap()
            .get(&self.source)
            .copied()
            .unwrap_or(self.targets.len());

        Ok(ProbeRound {
            sent: self.targets.len() as u64,
            replies: self
                .targets
                .iter()
                .take(answered)
                .map(|target| ProbeReply {
                    target: *target,
                    rtt: Duration::from_millis(1),
                })
                .collect(),
        })
    }

    async fn close(self: Box<Self>) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// One call made against the mock installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Install(CandidateRoute),
    Remove(CandidateRoute),
}

/// A route installer that records calls and can be told to fail
pub struct MockRouteInstaller {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_install: Arc<AtomicBool>,
    fail_remove: Arc<AtomicBool>,
}

impl MockRouteInstaller {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_install: Arc::new(AtomicBool::new(false)),
            fail_remove: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a new MockRouteInstaller that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            calls: Arc::clone(&other.calls),
            fail_install: Arc::clone(&other.fail_install),
            fail_remove: Arc::clone(&other.fail_remove),
        }
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RouteInstaller for MockRouteInstaller {
    async fn install(&self, route: &CandidateRoute) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Install(route.clone()));
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(Error::route("File exists (os error 17)"));
        }
        Ok(())
    }

    async fn remove(&self, route: &CandidateRoute) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Remove(route.clone()));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::route("No such process (os error 3)"));
        }
        Ok(())
    }

    fn installer_name(&self) -> &'static str {
        "mock"
    }
}
