//! Non-blocking raw ICMP socket driven by tokio's reactor

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tokio::io::unix::AsyncFd;

/// Raw `AF_INET`/`IPPROTO_ICMP` socket bound to one source address
pub(crate) struct RawIcmpSocket {
    inner: AsyncFd<OwnedFd>,
}

fn sockaddr(address: Ipv4Addr) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_addr = libc::in_addr {
        s_addr: u32::from(address).to_be(),
    };
    addr
}

impl RawIcmpSocket {
    /// Open the socket and bind it to `source`
    ///
    /// Needs `CAP_NET_RAW`.
    pub(crate) fn bind(source: Ipv4Addr) -> io::Result<Self> {
        // SAFETY: plain socket(2) call; the result is checked below.
        let fd = unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::IPPROTO_ICMP,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly opened descriptor we own.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let addr = sockaddr(source);
        // SAFETY: addr outlives the call and the length matches its type.
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            inner: AsyncFd::new(fd)?,
        })
    }

    /// Send one datagram to `target`
    pub(crate) async fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
        let addr = sockaddr(target);

        loop {
            let mut guard = self.inner.writable().await?;

            let result = guard.try_io(|inner| {
                // SAFETY: packet and addr are valid for the duration of the call.
                let ret = unsafe {
                    libc::sendto(
                        inner.as_raw_fd(),
                        packet.as_ptr() as *const libc::c_void,
                        packet.len(),
                        0,
                        &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                        mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(ret as usize)
                }
            });

            match result {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram (IPv4 header included)
    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;

            let result = guard.try_io(|inner| {
                // SAFETY: buf is valid for writes of buf.len() bytes.
                let ret = unsafe {
                    libc::recv(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(ret as usize)
                }
            });

            match result {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}
