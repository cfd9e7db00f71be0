//! ICMP echo encoding and reply parsing
//!
//! Layout of an echo message (RFC 792):
//!
//! ```text
//! Offset  Size  Field
//! 0       1     type (8 request, 0 reply)
//! 1       1     code (0)
//! 2       2     checksum
//! 4       2     identifier
//! 6       2     sequence number
//! 8       n     payload
//! ```
//!
//! Raw IPv4 sockets deliver the IP header in front of the ICMP message.

use std::net::Ipv4Addr;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;

/// ICMP header length
pub const ICMP_HEADER_LEN: usize = 8;

/// Minimum IPv4 header length
const IPV4_MIN_HEADER_LEN: usize = 20;

const IPPROTO_ICMP: u8 = 1;

/// Payload carried by every request
const PAYLOAD: &[u8; 24] = b"route-switcher-probe....";

/// Internet checksum (RFC 1071) over `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Encode an echo request
pub fn echo_request(ident: u16, sequence: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(ICMP_HEADER_LEN + PAYLOAD.len());
    packet.push(ICMP_ECHO_REQUEST);
    packet.push(0);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&ident.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(PAYLOAD);

    let sum = checksum(&packet);
    packet[2..4].copy_from_slice(&sum.to_be_bytes());
    packet
}

/// A parsed echo reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    /// Address that answered
    pub source: Ipv4Addr,
    pub ident: u16,
    pub sequence: u16,
}

/// Parse a datagram read from a raw ICMP socket
///
/// Returns `None` for anything that is not a well-formed echo reply.
pub fn parse_echo_reply(datagram: &[u8]) -> Option<EchoReply> {
    if datagram.len() < IPV4_MIN_HEADER_LEN || datagram[0] >> 4 != 4 {
        return None;
    }

    let header_len = usize::from(datagram[0] & 0x0f) * 4;
    if header_len < IPV4_MIN_HEADER_LEN || datagram[9] != IPPROTO_ICMP {
        return None;
    }

    let icmp = datagram.get(header_len..)?;
    if icmp.len() < ICMP_HEADER_LEN || icmp[0] != ICMP_ECHO_REPLY || icmp[1] != 0 {
        return None;
    }

    Some(EchoReply {
        source: Ipv4Addr::new(datagram[12], datagram[13], datagram[14], datagram[15]),
        ident: u16::from_be_bytes([icmp[4], icmp[5]]),
        sequence: u16::from_be_bytes([icmp[6], icmp[7]]),
    })
}
