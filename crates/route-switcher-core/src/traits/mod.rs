//! Core traits for the route switcher
//!
//! This module defines the boundaries to the platform.
//!
//! - [`LinkResolver`]: Look up interfaces and their addresses
//! - [`ProberFactory`] / [`Prober`]: Send reachability probes from a source address
//! - [`RouteInstaller`]: Add and delete kernel routes

pub mod link_resolver;
pub mod prober;
pub mod route_installer;

pub use link_resolver::{InterfaceHandle, LinkResolver};
pub use prober::{ProbeReply, ProbeRound, Prober, ProberFactory};
pub use route_installer::RouteInstaller;
