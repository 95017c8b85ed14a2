//! Dump requests.
//!
//! Bootstrap dumps all four kinds to learn the current kernel state; the
//! reset sweep dumps rules and routes to find what must be torn down. A dump
//! streams back as a multipart burst terminated by a done marker and an
//! acknowledgement.

use rtnetlink::packet_core::{NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NetlinkMessage};
use rtnetlink::packet_route::RouteNetlinkMessage;
use rtnetlink::packet_route::address::AddressMessage;
use rtnetlink::packet_route::link::LinkMessage;
use rtnetlink::packet_route::route::RouteMessage;
use rtnetlink::packet_route::rule::RuleMessage;

/// The four kinds of kernel state the daemon enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Links,
    Addresses,
    Routes,
    Rules,
}

impl DumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpKind::Links => "links",
            DumpKind::Addresses => "addresses",
            DumpKind::Routes => "routes",
            DumpKind::Rules => "rules",
        }
    }
}

/// Build a dump request for the given kind, both address families.
pub fn request(kind: DumpKind) -> NetlinkMessage<RouteNetlinkMessage> {
    let inner = match kind {
        DumpKind::Links => RouteNetlinkMessage::GetLink(LinkMessage::default()),
        DumpKind::Addresses => RouteNetlinkMessage::GetAddress(AddressMessage::default()),
        DumpKind::Routes => RouteNetlinkMessage::GetRoute(RouteMessage::default()),
        DumpKind::Rules => RouteNetlinkMessage::GetRule(RuleMessage::default()),
    };

    let mut request = NetlinkMessage::from(inner);
    request.header.flags = NLM_F_REQUEST | NLM_F_DUMP | NLM_F_ACK;
    request
}

#[cfg(test)]
mod tests {
    use rtnetlink::packet_core::NetlinkPayload;

    use super::*;

    #[test]
    fn dump_requests_have_dump_and_ack_flags() {
        for kind in [DumpKind::Links, DumpKind::Addresses, DumpKind::Routes, DumpKind::Rules] {
            let message = request(kind);
            assert_eq!(message.header.flags, NLM_F_REQUEST | NLM_F_DUMP | NLM_F_ACK, "{kind:?}");
        }
    }

    #[test]
    fn dump_kinds_map_to_get_requests() {
        let message = request(DumpKind::Rules);
        assert!(matches!(
            message.payload,
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::GetRule(_))
        ));
    }
}
