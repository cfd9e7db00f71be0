//! Candidate default routes
//!
//! A [`CandidateRoute`] is rebuilt from scratch on every controller tick.
//! Equality is canonical: destination, table and the next-hop set compared as
//! an unordered set of (interface, gateway) pairs.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use crate::registry::Path;

/// Equal-cost weight used for every next-hop
pub const EQUAL_COST_HOPS: u8 = 0;

/// Destination network of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Network address
    pub address: Ipv4Addr,
    /// Prefix length (0-32)
    pub prefix_len: u8,
}

impl Destination {
    /// The universal default network, `0.0.0.0/0`
    pub const DEFAULT: Self = Self {
        address: Ipv4Addr::UNSPECIFIED,
        prefix_len: 0,
    };
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DEFAULT {
            f.write_str("default")
        } else {
            write!(f, "{}/{}", self.address, self.prefix_len)
        }
    }
}

/// One next-hop of a (possibly multipath) route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NextHop {
    /// Kernel interface index
    pub interface_index: u32,
    /// Interface name, for logging
    pub interface: String,
    /// Gateway address
    pub gateway: Ipv4Addr,
    /// Relative cost ("hops"); `EQUAL_COST_HOPS` for every hop we build
    pub hops: u8,
}

impl NextHop {
    /// Build an equal-cost next-hop through a path
    pub fn via(path: &Path) -> Self {
        Self {
            interface_index: path.interface_index(),
            interface: path.interface().to_string(),
            gateway: path.gateway(),
            hops: EQUAL_COST_HOPS,
        }
    }

    fn key(&self) -> (u32, Ipv4Addr) {
        (self.interface_index, self.gateway)
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "via {} dev {}", self.gateway, self.interface)
    }
}

/// A default route as the controller wants it installed
#[derive(Debug, Clone)]
pub struct CandidateRoute {
    /// Destination network (always the default network for routes we build)
    pub destination: Destination,
    /// Routing table id
    pub table: u32,
    /// Next-hops, in selection order
    pub next_hops: Vec<NextHop>,
}

impl CandidateRoute {
    /// Build a default route in `table` over `next_hops`
    pub fn default_route(table: u32, next_hops: Vec<NextHop>) -> Self {
        Self {
            destination: Destination::DEFAULT,
            table,
            next_hops,
        }
    }

    /// Whether the route has no next-hop at all
    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }

    /// Whether the route spreads over more than one next-hop
    pub fn is_multipath(&self) -> bool {
        self.next_hops.len() > 1
    }

    fn hop_set(&self) -> BTreeSet<(u32, Ipv4Addr)> {
        self.next_hops.iter().map(NextHop::key).collect()
    }
}

impl PartialEq for CandidateRoute {
    fn eq(&self, other: &Self) -> bool {
        self.destination == other.destination
            && self.table == other.table
            && self.hop_set() == other.hop_set()
    }
}

impl Eq for CandidateRoute {}

impl fmt::Display for CandidateRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} table {}", self.destination, self.table)?;
        if self.next_hops.is_empty() {
            return f.write_str(" (no next-hops)");
        }
        for hop in &self.next_hops {
            write!(f, " nexthop {}", hop)?;
        }
        Ok(())
    }
}
