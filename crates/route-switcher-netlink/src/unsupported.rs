//! Stand-ins for platforms without rtnetlink

use std::net::Ipv4Addr;

use async_trait::async_trait;
use route_switcher_core::route::CandidateRoute;
use route_switcher_core::traits::{InterfaceHandle, LinkResolver, RouteInstaller};
use route_switcher_core::{Error, Result};

fn unsupported() -> Error {
    Error::netlink("Netlink is only supported on Linux")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetlinkLinkResolver;

impl NetlinkLinkResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkResolver for NetlinkLinkResolver {
    async fn lookup_interface(&self, _name: &str) -> Result<InterfaceHandle> {
        Err(unsupported())
    }

    async fn addresses_of(&self, _link: &InterfaceHandle) -> Result<Vec<Ipv4Addr>> {
        Err(unsupported())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetlinkRouteInstaller;

impl NetlinkRouteInstaller {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RouteInstaller for NetlinkRouteInstaller {
    async fn install(&self, _route: &CandidateRoute) -> Result<()> {
        Err(unsupported())
    }

    async fn remove(&self, _route: &CandidateRoute) -> Result<()> {
        Err(unsupported())
    }

    fn installer_name(&self) -> &'static str {
        "netlink"
    }
}
