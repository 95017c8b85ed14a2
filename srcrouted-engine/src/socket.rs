//! Ownership of the NETLINK_ROUTE socket.
//!
//! The socket is opened before bootstrap, held for the whole process
//! lifetime and closed on drop after the reset sweep. It is subscribed to
//! the link, address and route multicast groups for both families plus the
//! generic notify group, so every kernel-side change shows up as an inbound
//! message.

use std::io;

use rtnetlink::constants::{
    RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_IPV6_IFADDR, RTMGRP_IPV6_ROUTE, RTMGRP_LINK,
    RTMGRP_NOTIFY,
};
use rtnetlink::packet_core::NetlinkMessage;
use rtnetlink::packet_route::RouteNetlinkMessage;
use rtnetlink::sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use tokio::io::unix::AsyncFd;

/// Multicast subscriptions delivering link, address and route changes.
const MULTICAST_GROUPS: u32 = RTMGRP_LINK
    | RTMGRP_NOTIFY
    | RTMGRP_IPV4_IFADDR
    | RTMGRP_IPV6_IFADDR
    | RTMGRP_IPV4_ROUTE
    | RTMGRP_IPV6_ROUTE;

const SEND_BUFFER_SIZE: usize = 64 * 1024;
const RECV_BUFFER_SIZE: usize = 1024 * 1024;

/// Large enough to avoid message truncation on hosts with page sizes above
/// 4 KiB.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// The kernel control channel.
pub struct NetlinkSocket {
    fd: AsyncFd<Socket>,
    buf: Vec<u8>,
}

impl NetlinkSocket {
    /// Open, size and bind the socket. Any failure here is fatal to
    /// startup.
    pub fn open() -> io::Result<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        socket.set_tx_buf_sz(SEND_BUFFER_SIZE)?;
        socket.set_rx_buf_sz(RECV_BUFFER_SIZE)?;
        socket.bind(&SocketAddr::new(0, MULTICAST_GROUPS))?;
        socket.set_non_blocking(true)?;

        Ok(Self { fd: AsyncFd::new(socket)?, buf: vec![0u8; READ_BUFFER_SIZE] })
    }

    /// Transmit one serialized request. Netlink datagrams are written
    /// atomically; there are no partial sends to handle.
    pub fn send(&self, payload: &[u8]) -> io::Result<()> {
        self.fd.get_ref().send(payload, 0)?;
        Ok(())
    }

    /// Wait until the socket is readable, then drain every queued datagram
    /// without blocking. The drain only ends when the socket is empty,
    /// never on a multipart boundary, so one burst may span several dumps
    /// and notifications.
    pub async fn recv_burst(&mut self) -> io::Result<Vec<NetlinkMessage<RouteNetlinkMessage>>> {
        let mut messages = Vec::new();

        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|fd| fd.get_ref().recv(&mut &mut self.buf[..], 0)) {
                Ok(Ok(len)) => {
                    parse_datagram(&self.buf[..len], &mut messages);
                    break;
                }
                Ok(Err(error)) => return Err(error),
                Err(_would_block) => continue,
            }
        }

        loop {
            match self.fd.get_ref().recv(&mut &mut self.buf[..], 0) {
                Ok(len) => parse_datagram(&self.buf[..len], &mut messages),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => return Err(error),
            }
        }

        Ok(messages)
    }
}

/// Split one datagram into its netlink messages. A datagram from the kernel
/// may pack many messages; each is length-prefixed and 4-byte aligned.
/// Undecodable remainders are dropped with a log line.
fn parse_datagram(datagram: &[u8], out: &mut Vec<NetlinkMessage<RouteNetlinkMessage>>) {
    let mut offset = 0;
    while offset < datagram.len() {
        let message = match NetlinkMessage::<RouteNetlinkMessage>::deserialize(&datagram[offset..])
        {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(offset, %error, "skipping undecodable netlink message");
                break;
            }
        };

        let length = message.header.length as usize;
        out.push(message);
        if length == 0 {
            break;
        }
        offset += (length + 3) & !3;
    }
}

#[cfg(test)]
mod tests {
    use rtnetlink::packet_core::NetlinkPayload;
    use srcrouted_wire::dump::{self, DumpKind};

    use super::*;

    #[test]
    fn parses_packed_datagrams() {
        let first = srcrouted_wire::serialize(dump::request(DumpKind::Links), 1);
        let second = srcrouted_wire::serialize(dump::request(DumpKind::Routes), 2);

        let mut datagram = Vec::new();
        datagram.extend_from_slice(&first);
        datagram.extend_from_slice(&second);

        let mut messages = Vec::new();
        parse_datagram(&datagram, &mut messages);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].header.sequence_number, 1);
        assert_eq!(messages[1].header.sequence_number, 2);
        assert!(matches!(
            messages[1].payload,
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::GetRoute(_))
        ));
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let first = srcrouted_wire::serialize(dump::request(DumpKind::Links), 1);

        let mut datagram = Vec::new();
        datagram.extend_from_slice(&first);
        datagram.extend_from_slice(&first[..7]);

        let mut messages = Vec::new();
        parse_datagram(&datagram, &mut messages);
        assert_eq!(messages.len(), 1);
    }
}
