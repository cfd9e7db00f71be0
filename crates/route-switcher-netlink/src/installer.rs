//! Default route add/delete

use async_trait::async_trait;
use netlink_packet_core::{NLM_F_ACK, NLM_F_CREATE, NLM_F_REPLACE, NLM_F_REQUEST};
use netlink_packet_route::RouteNetlinkMessage;
use route_switcher_core::route::CandidateRoute;
use route_switcher_core::traits::RouteInstaller;
use route_switcher_core::{Error, Result};
use tracing::debug;

use crate::message;
use crate::socket::exchange;

/// Route installer writing to the kernel routing tables
///
/// Requires `CAP_NET_ADMIN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetlinkRouteInstaller;

impl NetlinkRouteInstaller {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RouteInstaller for NetlinkRouteInstaller {
    /// `ip route replace`: create, or overwrite a leftover default route
    async fn install(&self, route: &CandidateRoute) -> Result<()> {
        debug!(route = %route, "RTM_NEWROUTE");
        let request = RouteNetlinkMessage::NewRoute(message::route_message(route));

        exchange(move |socket| {
            socket
                .request(
                    request,
                    NLM_F_REQUEST
                        | NLM_F_ACK
                        | NLM_F_CREATE
                        | NLM_F_REPLACE,
                )
                .map(drop)
                .map_err(|e| Error::route(e.to_string()))
        })
        .await
    }

    async fn remove(&self, route: &CandidateRoute) -> Result<()> {
        debug!(route = %route, "RTM_DELROUTE");
        let request = RouteNetlinkMessage::DelRoute(message::route_delete_message(route));

        exchange(move |socket| {
            socket
                .request(request, NLM_F_REQUEST | NLM_F_ACK)
                .map(drop)
                .map_err(|e| Error::route(e.to_string()))
        })
        .await
    }

    fn installer_name(&self) -> &'static str {
        "netlink"
    }
}
