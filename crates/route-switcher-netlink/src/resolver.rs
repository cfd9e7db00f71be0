//! Interface and address lookup

use std::net::Ipv4Addr;

use async_trait::async_trait;
use netlink_packet_core::{NLM_F_DUMP, NLM_F_REQUEST};
use netlink_packet_route::RouteNetlinkMessage;
use route_switcher_core::traits::{InterfaceHandle, LinkResolver};
use route_switcher_core::{Error, Result};
use tracing::debug;

use crate::message;
use crate::socket::exchange;

/// Link resolver backed by rtnetlink dumps
///
/// Nothing is cached; every call asks the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetlinkLinkResolver;

impl NetlinkLinkResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkResolver for NetlinkLinkResolver {
    async fn lookup_interface(&self, name: &str) -> Result<InterfaceHandle> {
        let wanted = name.to_string();

        let index = exchange(move |socket| {
            let links = socket
                .request(
                    RouteNetlinkMessage::GetLink(message::link_dump_request()),
                    NLM_F_REQUEST | NLM_F_DUMP,
                )
                .map_err(|e| Error::netlink(format!("Failed to list links: {}", e)))?;

            Ok(links.iter().find_map(|reply| match reply {
                RouteNetlinkMessage::NewLink(link) => message::link_index(link, &wanted),
                _ => None,
            }))
        })
        .await?;

        let index = index.ok_or_else(|| Error::link_not_found(name))?;
        debug!(interface = name, ifindex = index, "Resolved interface");

        Ok(InterfaceHandle::new(index, name))
    }

    async fn addresses_of(&self, link: &InterfaceHandle) -> Result<Vec<Ipv4Addr>> {
        let index = link.index;

        exchange(move |socket| {
            let replies = socket
                .request(
                    RouteNetlinkMessage::GetAddress(message::address_dump_request()),
                    NLM_F_REQUEST | NLM_F_DUMP,
                )
                .map_err(|e| Error::netlink(format!("Failed to list addresses: {}", e)))?;

            let addresses = replies.iter().filter_map(|reply| match reply {
                RouteNetlinkMessage::NewAddress(address) => Some(address),
                _ => None,
            });

            Ok(message::ipv4_addresses(addresses, index))
        })
        .await
    }
}
