// # Netlink Bindings
//
// This crate provides the Linux rtnetlink side of the route switcher:
//
// - `NetlinkLinkResolver`: interface lookup by name and IPv4 address listing
// - `NetlinkRouteInstaller`: default route add/delete in a routing table
//
// ## Implementation
//
// Every operation opens a short-lived `NETLINK_ROUTE` socket, sends one
// request and reads until the kernel acknowledges it (or finishes the dump).
// Sockets are blocking, so the exchange runs on tokio's blocking pool.
// Messages are built and parsed with `netlink-packet-route`.
//
// ## Platform Support
//
// On other platforms both types exist but every call fails with
// `Error::Netlink`, so the daemon can still be built there and run in
// dry-run mode.

#[cfg(target_os = "linux")]
mod installer;
#[cfg(target_os = "linux")]
mod message;
#[cfg(target_os = "linux")]
mod resolver;
#[cfg(target_os = "linux")]
mod socket;

#[cfg(target_os = "linux")]
pub use installer::NetlinkRouteInstaller;
#[cfg(target_os = "linux")]
pub use resolver::NetlinkLinkResolver;

#[cfg(not(target_os = "linux"))]
mod unsupported;

#[cfg(not(target_os = "linux"))]
pub use unsupported::{NetlinkLinkResolver, NetlinkRouteInstaller};
