//! Request/response exchange over a `NETLINK_ROUTE` socket

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use netlink_packet_core::{NetlinkHeader, NetlinkMessage, NetlinkPayload};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use route_switcher_core::{Error, Result};
use tracing::trace;

/// Receive buffer size; large enough for one dump chunk from the kernel
const RECEIVE_BUFFER_SIZE: usize = 64 * 1024;

static SEQUENCE: AtomicU32 = AtomicU32::new(1);

/// A connected rtnetlink socket
pub(crate) struct RtnlSocket {
    socket: Socket,
}

impl RtnlSocket {
    /// Open and bind a socket to the kernel
    pub(crate) fn connect() -> io::Result<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        Ok(Self { socket })
    }

    /// Send `message` and collect the replies
    ///
    /// Returns once the kernel acknowledged the request or finished the
    /// dump. A negative acknowledgement becomes the matching OS error, so
    /// `EEXIST` reads as "File exists (os error 17)".
    pub(crate) fn request(
        &mut self,
        message: RouteNetlinkMessage,
        flags: u16,
    ) -> io::Result<Vec<RouteNetlinkMessage>> {
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

        let mut header = NetlinkHeader::default();
        header.flags = flags;
        header.sequence_number = sequence;

        let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(message));
        packet.finalize();

        let mut buf = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut buf[..]);
        self.socket.send(&buf, 0)?;

        let mut replies = Vec::new();
        let mut receive = vec![0u8; RECEIVE_BUFFER_SIZE];

        loop {
            let len = self.socket.recv(&mut &mut receive[..], 0)?;
            let mut offset = 0;

            while offset < len {
                let reply = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&receive[offset..len])
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

                let length = reply.header.length as usize;
                if length == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "zero-length netlink message",
                    ));
                }
                // Messages are 4-byte aligned
                offset += (length + 3) & !3;

                if reply.header.sequence_number != sequence {
                    trace!(sequence = reply.header.sequence_number, "Skipping foreign netlink message");
                    continue;
                }

                match reply.payload {
                    NetlinkPayload::InnerMessage(inner) => replies.push(inner),
                    NetlinkPayload::Done(_) => return Ok(replies),
                    NetlinkPayload::Error(error) => {
                        return match error.code {
                            None => Ok(replies),
                            Some(code) => Err(io::Error::from_raw_os_error(-code.get())),
                        };
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Run `f` against a fresh socket on the blocking pool
pub(crate) async fn exchange<F, T>(f: F) -> Result<T>
where
    F: FnOnce(&mut RtnlSocket) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut socket = RtnlSocket::connect()
            .map_err(|e| Error::netlink(format!("Failed to open netlink socket: {}", e)))?;
        f(&mut socket)
    })
    .await
    .map_err(|e| Error::netlink(format!("netlink task failed: {}", e)))?
}
