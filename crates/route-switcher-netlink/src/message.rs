//! rtnetlink message construction and parsing
//!
//! Pure functions, kept apart from the socket so they can be unit tested.

use std::net::{IpAddr, Ipv4Addr};

use netlink_packet_route::AddressFamily;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use netlink_packet_route::route::{
    RouteAddress, RouteAttribute, RouteMessage, RouteNextHop, RouteProtocol, RouteScope, RouteType,
};
use route_switcher_core::route::CandidateRoute;

/// Header value telling the kernel to read the table from `RTA_TABLE`
const RT_TABLE_UNSPEC: u8 = 0;

/// Build the kernel representation of `route`
///
/// One next-hop is encoded as a plain gateway route, several as `RTA_MULTIPATH`.
/// A route without next-hops is sent as-is and left to the kernel to judge.
pub(crate) fn route_message(route: &CandidateRoute) -> RouteMessage {
    let mut message = RouteMessage::default();

    message.header.address_family = AddressFamily::Inet;
    message.header.destination_prefix_length = route.destination.prefix_len;
    message.header.protocol = RouteProtocol::Boot;
    message.header.scope = RouteScope::Universe;
    message.header.kind = RouteType::Unicast;
    message.header.table = u8::try_from(route.table).unwrap_or(RT_TABLE_UNSPEC);

    message.attributes.push(RouteAttribute::Table(route.table));

    if route.destination.prefix_len > 0 {
        message
            .attributes
            .push(RouteAttribute::Destination(RouteAddress::Inet(route.destination.address)));
    }

    match route.next_hops.as_slice() {
        [] => {}
        [hop] => {
            message
                .attributes
                .push(RouteAttribute::Gateway(RouteAddress::Inet(hop.gateway)));
            message.attributes.push(RouteAttribute::Oif(hop.interface_index));
        }
        hops => {
            let next_hops = hops
                .iter()
                .map(|hop| {
                    let mut next_hop = RouteNextHop::default();
                    next_hop.interface_index = hop.interface_index;
                    next_hop.hops = hop.hops;
                    next_hop
                        .attributes
                        .push(RouteAttribute::Gateway(RouteAddress::Inet(hop.gateway)));
                    next_hop
                })
                .collect();
            message.attributes.push(RouteAttribute::MultiPath(next_hops));
        }
    }

    message
}

/// Build the delete request for `route`
pub(crate) fn route_delete_message(route: &CandidateRoute) -> RouteMessage {
    let mut message = route_message(route);
    // Match the route whatever scope the kernel stored it with
    message.header.scope = RouteScope::NoWhere;
    message
}

/// Request dumping every link
pub(crate) fn link_dump_request() -> LinkMessage {
    LinkMessage::default()
}

/// Request dumping every IPv4 address
pub(crate) fn address_dump_request() -> AddressMessage {
    let mut message = AddressMessage::default();
    message.header.family = AddressFamily::Inet;
    message
}

/// Interface index of `link` if its name is `name`
pub(crate) fn link_index(link: &LinkMessage, name: &str) -> Option<u32> {
    link.attributes
        .iter()
        .any(|attr| matches!(attr, LinkAttribute::IfName(n) if n == name))
        .then_some(link.header.index)
}

/// IPv4 addresses among `addresses` that belong to `index`, in kernel order
///
/// Uses the local address when present (it differs from `IFA_ADDRESS` only on
/// point-to-point links).
pub(crate) fn ipv4_addresses<'a>(
    addresses: impl IntoIterator<Item = &'a AddressMessage>,
    index: u32,
) -> Vec<Ipv4Addr> {
    addresses
        .into_iter()
        .filter(|message| message.header.index == index)
        .filter_map(|message| {
            let local = message.attributes.iter().find_map(|attr| match attr {
                AddressAttribute::Local(IpAddr::V4(ip)) => Some(*ip),
                _ => None,
            });
            local.or_else(|| {
                message.attributes.iter().find_map(|attr| match attr {
                    AddressAttribute::Address(IpAddr::V4(ip)) => Some(*ip),
                    _ => None,
                })
            })
        })
        .collect()
}
