// # Prober Trait
//
// Defines the interface for reachability probing over one path.
//
// A prober is bound to a source address and a fixed target list. Each call to
// `probe_round()` sends one echo per target and collects the replies that
// arrive before the round-trip timeout.
//
// ## Implementations
//
// - Raw-socket ICMP echo (Linux): `route-switcher-icmp` crate
//
// ## Usage
//
// ```rust,ignore
// use route_switcher_core::ProberFactory;
//
// let mut prober = factory.bind(source, targets, Duration::from_secs(1)).await?;
// let round = prober.probe_round().await?;
// println!("{}/{} answered", round.received(), round.sent);
// prober.close().await;
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// A reply received within the round-trip timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReply {
    /// Target that answered
    pub target: Ipv4Addr,
    /// Measured round-trip time
    pub rtt: Duration,
}

/// Outcome of one probe round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRound {
    /// Probes attempted (one per configured target)
    pub sent: u64,
    /// Replies that arrived in time, at most one per target
    pub replies: Vec<ProbeReply>,
}

impl ProbeRound {
    /// Number of probes answered
    pub fn received(&self) -> u64 {
        self.replies.len() as u64
    }
}

/// A bound prober
///
/// Owned by exactly one health monitor.
#[async_trait]
pub trait Prober: Send {
    /// Run one probe round
    ///
    /// Must return within roughly the round-trip timeout. Dropping the
    /// future mid-round is allowed and loses only that round.
    async fn probe_round(&mut self) -> Result<ProbeRound, crate::Error>;

    /// Release the probe socket
    async fn close(self: Box<Self>) {}
}

/// Trait for constructing probers
///
/// ## Allowed Capabilities
/// - ✅ Open and bind sockets
///
/// ## Forbidden Capabilities
/// - ❌ Compute health or decide routing
/// - ❌ Spawn background tasks that outlive the returned prober
#[async_trait]
pub trait ProberFactory: Send + Sync {
    /// Bind a prober to `source`, probing `targets`
    async fn bind(
        &self,
        source: Ipv4Addr,
        targets: Arc<[Ipv4Addr]>,
        max_rtt: Duration,
    ) -> Result<Box<dyn Prober>, crate::Error>;
}
