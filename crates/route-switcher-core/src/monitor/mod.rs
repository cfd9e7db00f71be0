//! Per-path health monitor
//!
//! One monitor runs per registered path. It probes every target from the
//! path's local address and adds each completed round to the path's
//! [`PathStatistic`](crate::stats::PathStatistic). It never classifies
//! health and never touches the routing table.
//!
//! ## Lifecycle
//!
//! 1. Resolve the path's local IPv4 address (`Error::NoAddress` if none)
//! 2. Bind a prober to it
//! 3. Probe in rounds until the shutdown token fires
//! 4. Close the prober and return
//!
//! A monitor that fails in step 1 or 2 returns the error and never probes,
//! leaving its path at zero traffic so the controller keeps it excluded.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ProbeConfig;
use crate::error::{Error, Result};
use crate::registry::PathEntry;
use crate::traits::{LinkResolver, ProberFactory};

/// Health monitor bound to one path
pub struct HealthMonitor {
    entry: PathEntry,
    resolver: Arc<dyn LinkResolver>,
    prober_factory: Arc<dyn ProberFactory>,
    targets: Arc<[Ipv4Addr]>,
    probe: ProbeConfig,
}

impl HealthMonitor {
    /// Create a monitor for `entry`
    pub fn new(
        entry: PathEntry,
        resolver: Arc<dyn LinkResolver>,
        prober_factory: Arc<dyn ProberFactory>,
        targets: Arc<[Ipv4Addr]>,
        probe: ProbeConfig,
    ) -> Self {
        Self {
            entry,
            resolver,
            prober_factory,
            targets,
            probe,
        }
    }

    /// Run until `shutdown` is cancelled
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error::NoAddress)`: The interface has no IPv4 address
    /// - `Err(Error)`: The prober could not be bound
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let path = Arc::clone(self.entry.path());
        let statistic = Arc::clone(self.entry.statistic());

        let source = self.resolve_source().await?;
        info!(path = %path, source = %source, targets = self.targets.len(), "Monitoring path");

        let mut prober = self
            .prober_factory
            .bind(source, Arc::clone(&self.targets), self.probe.max_rtt())
            .await
            .inspect_err(|e| error!(path = %path, "Failed to bind prober: {}", e))?;

        let mut rounds = tokio::time::interval(self.probe.round_interval());
        rounds.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = rounds.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = prober.probe_round() => outcome,
            };

            match outcome {
                Ok(round) => {
                    for reply in &round.replies {
                        trace!(path = %path, target = %reply.target, rtt = ?reply.rtt, "Echo reply");
                    }
                    statistic.record_round(round.sent, round.received());
                }
                Err(e) => {
                    // Every target was attempted; none answered.
                    warn!(path = %path, "Probe round failed: {}", e);
                    statistic.record_round(self.targets.len() as u64, 0);
                }
            }
        }

        info!(path = %path, "Shutting down path monitor");
        prober.close().await;
        debug!(path = %path, "Prober closed");

        Ok(())
    }

    /// First IPv4 address of the path's interface
    async fn resolve_source(&self) -> Result<Ipv4Addr> {
        let path = self.entry.path();
        let addresses = self.resolver.addresses_of(path.link()).await?;

        debug!(path = %path, addresses = ?addresses, "Interface addresses");

        addresses.first().copied().ok_or_else(|| {
            error!(path = %path, "No available IPs to check");
            Error::no_address(path.interface())
        })
    }
}
