// # ICMP Echo Prober
//
// This crate provides the reachability probe used by the health monitors:
// ICMP echo requests sent from a fixed local address over a raw socket.
//
// ## Round Semantics
//
// - One echo request per target, all sent back to back
// - Replies are matched on identifier, sequence number and source address
// - Late replies (after the round-trip timeout), duplicates and replies for
//   other probers on the host are ignored
// - A round ends at the timeout or as soon as every target answered
//
// Binding the source address makes the kernel pick the route for that
// address, so with source-based policy routing each prober tests its own
// uplink.
//
// ## Platform Support
//
// Raw sockets need Linux and `CAP_NET_RAW`. Elsewhere `bind()` fails with
// `Error::Probe`.

pub mod packet;

#[cfg(target_os = "linux")]
mod socket;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use route_switcher_core::traits::{Prober, ProberFactory};
use route_switcher_core::Result;

#[cfg(target_os = "linux")]
pub use linux::IcmpProber;

/// Factory binding one `IcmpProber` per health monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct IcmpProberFactory;

impl IcmpProberFactory {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl ProberFactory for IcmpProberFactory {
    async fn bind(
        &self,
        source: Ipv4Addr,
        targets: Arc<[Ipv4Addr]>,
        max_rtt: Duration,
    ) -> Result<Box<dyn Prober>> {
        Ok(Box::new(IcmpProber::bind(source, targets, max_rtt)?))
    }
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl ProberFactory for IcmpProberFactory {
    async fn bind(
        &self,
        _source: Ipv4Addr,
        _targets: Arc<[Ipv4Addr]>,
        _max_rtt: Duration,
    ) -> Result<Box<dyn Prober>> {
        Err(route_switcher_core::Error::probe(
            "Raw ICMP sockets are only supported on Linux",
        ))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use route_switcher_core::traits::{ProbeReply, ProbeRound, Prober};
    use route_switcher_core::{Error, Result};
    use tokio::time::Instant;
    use tracing::{debug, trace};

    use crate::packet;
    use crate::socket::RawIcmpSocket;

    /// Large enough for any echo reply we care about
    const RECEIVE_BUFFER_SIZE: usize = 1500;

    static NEXT_IDENT: AtomicU16 = AtomicU16::new(0);

    /// Echo identifier unique among the probers of this process
    pub(super) fn next_ident() -> u16 {
        (std::process::id() as u16).wrapping_add(NEXT_IDENT.fetch_add(1, Ordering::Relaxed))
    }

    /// ICMP echo prober bound to one source address
    pub struct IcmpProber {
        socket: RawIcmpSocket,
        source: Ipv4Addr,
        targets: Arc<[Ipv4Addr]>,
        max_rtt: Duration,
        ident: u16,
        sequence: u16,
    }

    impl IcmpProber {
        /// Open a raw socket bound to `source`
        pub fn bind(source: Ipv4Addr, targets: Arc<[Ipv4Addr]>, max_rtt: Duration) -> Result<Self> {
            let socket = RawIcmpSocket::bind(source).map_err(|e| {
                Error::probe(format!("Failed to open ICMP socket on {}: {}", source, e))
            })?;

            let ident = next_ident();
            debug!(source = %source, ident, "ICMP socket bound");

            Ok(Self {
                socket,
                source,
                targets,
                max_rtt,
                ident,
                sequence: 0,
            })
        }
    }

    #[async_trait]
    impl Prober for IcmpProber {
        async fn probe_round(&mut self) -> Result<ProbeRound> {
            self.sequence = self.sequence.wrapping_add(1);
            let request = packet::echo_request(self.ident, self.sequence);

            let mut pending: HashMap<Ipv4Addr, Instant> = HashMap::with_capacity(self.targets.len());
            let mut last_error = None;

            for target in self.targets.iter() {
                let sent_at = Instant::now();
                match self.socket.send_to(&request, *target).await {
                    Ok(_) => {
                        pending.insert(*target, sent_at);
                    }
                    Err(e) => {
                        trace!(source = %self.source, target = %target, "Echo request failed: {}", e);
                        last_error = Some(e);
                    }
                }
            }

            if pending.is_empty()
                && let Some(e) = last_error
            {
                return Err(Error::probe(format!("{} from {}", e, self.source)));
            }

            let deadline = Instant::now() + self.max_rtt;
            let mut replies = Vec::with_capacity(pending.len());
            let mut buf = [0u8; RECEIVE_BUFFER_SIZE];

            while !pending.is_empty() {
                let len = match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Err(_elapsed) => break,
                    Ok(Ok(len)) => len,
                    Ok(Err(e)) => {
                        debug!(source = %self.source, "Receive failed: {}", e);
                        break;
                    }
                };

                let Some(reply) = packet::parse_echo_reply(&buf[..len]) else {
                    continue;
                };
                if reply.ident != self.ident || reply.sequence != self.sequence {
                    continue;
                }
                // Each target counts once per round
                let Some(sent_at) = pending.remove(&reply.source) else {
                    continue;
                };

                replies.push(ProbeReply {
                    target: reply.source,
                    rtt: sent_at.elapsed(),
                });
            }

            Ok(ProbeRound {
                sent: self.targets.len() as u64,
                replies,
            })
        }

        async fn close(self: Box<Self>) {
            debug!(source = %self.source, ident = self.ident, "Closing ICMP socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "linux"))]
    #[tokio::test]
    async fn test_bind_unsupported() {
        let factory = IcmpProberFactory::new();
        let targets: Arc<[Ipv4Addr]> = vec![Ipv4Addr::new(8, 8, 8, 8)].into();

        let result = factory
            .bind(Ipv4Addr::LOCALHOST, targets, Duration::from_secs(1))
            .await;
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_probers_get_distinct_idents() {
        let a = linux::next_ident();
        let b = linux::next_ident();
        assert_ne!(a, b);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_loopback_round() {
        let factory = IcmpProberFactory::new();
        let targets: Arc<[Ipv4Addr]> = vec![Ipv4Addr::LOCALHOST].into();

        // Raw sockets need CAP_NET_RAW
        let Ok(mut prober) = factory
            .bind(Ipv4Addr::LOCALHOST, targets, Duration::from_secs(1))
            .await
        else {
            return;
        };

        let round = prober.probe_round().await.unwrap();
        assert_eq!(round.sent, 1);
        assert!(round.received() <= 1);
        assert!(round.replies.iter().all(|r| r.target == Ipv4Addr::LOCALHOST));
        prober.close().await;
    }
}
