//! Parsing of inbound kernel messages into typed events.
//!
//! The kernel is chatty: dumps, multicast notifications and request
//! acknowledgements all arrive on the same socket. Everything is reduced to
//! the [`Event`] enum here; messages the daemon has no use for map to `None`
//! and are logged at trace level. Decode anomalies (truncated attribute
//! sequences, short messages) are skipped the same way, so the engine never
//! sees them.

use std::net::IpAddr;

use rtnetlink::packet_core::{NetlinkMessage, NetlinkPayload};
use rtnetlink::packet_route::{AddressFamily, RouteNetlinkMessage};
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::packet_route::route::{RouteAddress, RouteAttribute, RouteMessage, RouteScope};
use rtnetlink::packet_route::rule::{RuleAttribute, RuleMessage};

/// A kernel event the synchronization engine reacts to.
///
/// Events are dispatched in arrival order and never queued beyond the
/// handler invocation that consumes them.
#[derive(Debug, Clone)]
pub enum Event {
    LinkAdded { index: u32, name: Option<String> },
    LinkRemoved { index: u32, name: Option<String> },
    AddressAdded(AddressEvent),
    AddressRemoved(AddressEvent),
    RouteAdded(RouteEvent),
    RouteRemoved(RouteEvent),
    RuleAdded(RuleEvent),
    RuleRemoved(RuleEvent),
    /// A request acknowledgement. `code` is 0 for success, a negative errno
    /// otherwise.
    Acknowledgement { sequence: u32, code: i32 },
    /// End of a multipart dump.
    DumpDone,
}

/// An address notification, reduced to the fields the rule policy needs.
#[derive(Debug, Clone)]
pub struct AddressEvent {
    pub family: AddressFamily,
    pub index: u32,
    pub prefix_len: u8,
    pub address: IpAddr,
}

impl AddressEvent {
    /// IPv6 link-local addresses (fe80::/10) never get a policy rule.
    pub fn is_link_local(&self) -> bool {
        match self.address {
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
            IpAddr::V4(_) => false,
        }
    }
}

/// A route notification. The original typed message is retained so the
/// engine can clone it into a custom table without re-encoding attributes.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    /// Effective table id: the RTA_TABLE attribute when present (it carries
    /// the full 32-bit value), the legacy 8-bit header field otherwise.
    pub table: u32,
    /// Output interface index, if the route has one.
    pub oif: Option<u32>,
    pub message: RouteMessage,
}

impl RouteEvent {
    pub fn family(&self) -> AddressFamily {
        self.message.header.address_family
    }

    pub fn scope(&self) -> RouteScope {
        self.message.header.scope
    }

    /// Destination prefix, `None` for default routes.
    pub fn destination(&self) -> Option<IpAddr> {
        self.message.attributes.iter().find_map(|attr| match attr {
            RouteAttribute::Destination(addr) => route_address_ip(addr),
            _ => None,
        })
    }

    pub fn gateway(&self) -> Option<IpAddr> {
        self.message.attributes.iter().find_map(|attr| match attr {
            RouteAttribute::Gateway(addr) => route_address_ip(addr),
            _ => None,
        })
    }

    pub fn metric(&self) -> Option<u32> {
        self.message.attributes.iter().find_map(|attr| match attr {
            RouteAttribute::Priority(metric) => Some(*metric),
            _ => None,
        })
    }
}

/// A policy-rule notification, used only by the reset sweep.
#[derive(Debug, Clone)]
pub struct RuleEvent {
    pub table: u32,
    pub priority: Option<u32>,
    pub message: RuleMessage,
}

/// Parse one inbound message into an [`Event`].
///
/// Returns `None` for message kinds the daemon ignores.
pub fn parse(message: NetlinkMessage<RouteNetlinkMessage>) -> Option<Event> {
    let sequence = message.header.sequence_number;

    match message.payload {
        NetlinkPayload::Done(_) => Some(Event::DumpDone),
        NetlinkPayload::Error(err) => {
            Some(Event::Acknowledgement { sequence, code: err.raw_code() })
        }
        NetlinkPayload::InnerMessage(inner) => parse_inner(inner),
        other => {
            tracing::trace!(payload = ?other, "ignoring unexpected netlink payload");
            None
        }
    }
}

fn parse_inner(message: RouteNetlinkMessage) -> Option<Event> {
    match message {
        RouteNetlinkMessage::NewLink(link) => {
            let (index, name) = link_fields(link);
            Some(Event::LinkAdded { index, name })
        }
        RouteNetlinkMessage::DelLink(link) => {
            let (index, name) = link_fields(link);
            Some(Event::LinkRemoved { index, name })
        }
        RouteNetlinkMessage::NewAddress(address) => address_event(address).map(Event::AddressAdded),
        RouteNetlinkMessage::DelAddress(address) => {
            address_event(address).map(Event::AddressRemoved)
        }
        RouteNetlinkMessage::NewRoute(route) => Some(Event::RouteAdded(route_event(route))),
        RouteNetlinkMessage::DelRoute(route) => Some(Event::RouteRemoved(route_event(route))),
        RouteNetlinkMessage::NewRule(rule) => Some(Event::RuleAdded(rule_event(rule))),
        RouteNetlinkMessage::DelRule(rule) => Some(Event::RuleRemoved(rule_event(rule))),
        other => {
            tracing::trace!(message = ?other, "ignoring unhandled message kind");
            None
        }
    }
}

fn link_fields(link: LinkMessage) -> (u32, Option<String>) {
    let index = link.header.index;
    let name = link.attributes.into_iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name),
        _ => None,
    });

    (index, name)
}

fn address_event(address: AddressMessage) -> Option<AddressEvent> {
    // IFA_ADDRESS first, IFA_LOCAL as fallback. On ordinary broadcast
    // interfaces they are the same; on point-to-point links IFA_ADDRESS is
    // the attribute the kernel fills first.
    let ip = address
        .attributes
        .iter()
        .find_map(|attr| match attr {
            AddressAttribute::Address(ip) => Some(*ip),
            _ => None,
        })
        .or_else(|| {
            address.attributes.iter().find_map(|attr| match attr {
                AddressAttribute::Local(ip) => Some(*ip),
                _ => None,
            })
        });

    let Some(ip) = ip else {
        tracing::trace!(index = address.header.index, "address message without address attribute");
        return None;
    };

    Some(AddressEvent {
        family: address.header.family,
        index: address.header.index,
        prefix_len: address.header.prefix_len,
        address: ip,
    })
}

fn route_event(route: RouteMessage) -> RouteEvent {
    let table = route
        .attributes
        .iter()
        .find_map(|attr| match attr {
            RouteAttribute::Table(table) => Some(*table),
            _ => None,
        })
        .unwrap_or(route.header.table as u32);

    let oif = route.attributes.iter().find_map(|attr| match attr {
        RouteAttribute::Oif(index) => Some(*index),
        _ => None,
    });

    RouteEvent { table, oif, message: route }
}

fn rule_event(rule: RuleMessage) -> RuleEvent {
    let table = rule
        .attributes
        .iter()
        .find_map(|attr| match attr {
            RuleAttribute::Table(table) => Some(*table),
            _ => None,
        })
        .unwrap_or(rule.header.table as u32);

    let priority = rule.attributes.iter().find_map(|attr| match attr {
        RuleAttribute::Priority(priority) => Some(*priority),
        _ => None,
    });

    RuleEvent { table, priority, message: rule }
}

fn route_address_ip(addr: &RouteAddress) -> Option<IpAddr> {
    match addr {
        RouteAddress::Inet(v4) => Some(IpAddr::V4(*v4)),
        RouteAddress::Inet6(v6) => Some(IpAddr::V6(*v6)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use rtnetlink::packet_core::NetlinkMessage;
    use rtnetlink::packet_route::route::RouteHeader;

    use super::*;

    fn address_message(ip: IpAddr, prefix_len: u8, index: u32) -> AddressMessage {
        let mut message = AddressMessage::default();
        message.header.family = match ip {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        };
        message.header.prefix_len = prefix_len;
        message.header.index = index;
        message.attributes.push(AddressAttribute::Address(ip));
        message
    }

    #[test]
    fn parses_address_added() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let message =
            NetlinkMessage::from(RouteNetlinkMessage::NewAddress(address_message(ip, 24, 3)));

        match parse(message) {
            Some(Event::AddressAdded(event)) => {
                assert_eq!(event.address, ip);
                assert_eq!(event.prefix_len, 24);
                assert_eq!(event.index, 3);
                assert!(!event.is_link_local());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn flags_ipv6_link_local() {
        let lla = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0x1234, 0, 0, 1));
        let message =
            NetlinkMessage::from(RouteNetlinkMessage::NewAddress(address_message(lla, 64, 2)));

        match parse(message) {
            Some(Event::AddressAdded(event)) => assert!(event.is_link_local()),
            other => panic!("unexpected event: {other:?}"),
        }

        let global = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
        let message =
            NetlinkMessage::from(RouteNetlinkMessage::NewAddress(address_message(global, 64, 2)));

        match parse(message) {
            Some(Event::AddressAdded(event)) => assert!(!event.is_link_local()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn address_without_address_attribute_is_skipped() {
        let mut message = AddressMessage::default();
        message.header.family = AddressFamily::Inet;
        let message = NetlinkMessage::from(RouteNetlinkMessage::NewAddress(message));

        assert!(parse(message).is_none());
    }

    #[test]
    fn route_table_attribute_wins_over_header_field() {
        let mut route = RouteMessage::default();
        route.header.table = RouteHeader::RT_TABLE_MAIN;
        route.attributes.push(RouteAttribute::Table(2000));
        route.attributes.push(RouteAttribute::Oif(7));

        let message = NetlinkMessage::from(RouteNetlinkMessage::NewRoute(route));
        match parse(message) {
            Some(Event::RouteAdded(event)) => {
                assert_eq!(event.table, 2000);
                assert_eq!(event.oif, Some(7));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn route_without_table_attribute_falls_back_to_header() {
        let mut route = RouteMessage::default();
        route.header.table = RouteHeader::RT_TABLE_MAIN;

        let message = NetlinkMessage::from(RouteNetlinkMessage::NewRoute(route));
        match parse(message) {
            Some(Event::RouteAdded(event)) => {
                assert_eq!(event.table, RouteHeader::RT_TABLE_MAIN as u32)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_link_name() {
        let mut link = LinkMessage::default();
        link.header.index = 4;
        link.attributes.push(LinkAttribute::IfName("eno1".to_string()));

        let message = NetlinkMessage::from(RouteNetlinkMessage::NewLink(link));
        match parse(message) {
            Some(Event::LinkAdded { index, name }) => {
                assert_eq!(index, 4);
                assert_eq!(name.as_deref(), Some("eno1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
