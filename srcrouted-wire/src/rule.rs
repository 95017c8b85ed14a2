//! Builders for source-address policy rules.
//!
//! Every managed address gets exactly one `from <addr> lookup <table>` rule.
//! The rule's priority is set to the table id, which gives deterministic
//! per-table ordering and makes deletion unambiguous.

use std::net::IpAddr;

use rtnetlink::packet_core::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkMessage,
};
use rtnetlink::packet_route::rule::{RuleAction, RuleAttribute, RuleMessage};
use rtnetlink::packet_route::{AddressFamily, RouteNetlinkMessage};

/// Builder for the policy rule belonging to one interface address.
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use srcrouted_wire::rule::RuleRequest;
///
/// let request = RuleRequest::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 2000);
/// let message = request.create();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleRequest {
    /// The source address the rule selects on, matched with a full-length
    /// prefix (/32 or /128).
    pub source: IpAddr,
    /// The custom table the rule points at; doubles as the rule priority.
    pub table: u32,
}

impl RuleRequest {
    pub fn new(source: IpAddr, table: u32) -> Self {
        Self { source, table }
    }

    fn message(&self) -> RuleMessage {
        let mut message = RuleMessage::default();
        message.header.family = match self.source {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        };
        message.header.src_len = match self.source {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        message.header.action = RuleAction::ToTable;

        // The 8-bit header table field cannot hold ids >= 256; the FRA_TABLE
        // attribute carries the full 32-bit value.
        message.attributes.push(RuleAttribute::Source(self.source));
        message.attributes.push(RuleAttribute::Table(self.table));
        message.attributes.push(RuleAttribute::Priority(self.table));

        message
    }

    /// Build the RTM_NEWRULE request installing this rule.
    pub fn create(self) -> NetlinkMessage<RouteNetlinkMessage> {
        let mut request = NetlinkMessage::from(RouteNetlinkMessage::NewRule(self.message()));
        request.header.flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
        request
    }

    /// Build the RTM_DELRULE request removing this rule again.
    pub fn delete(self) -> NetlinkMessage<RouteNetlinkMessage> {
        let mut request = NetlinkMessage::from(RouteNetlinkMessage::DelRule(self.message()));
        request.header.flags = NLM_F_REQUEST | NLM_F_ACK;
        request
    }
}

/// Build an RTM_DELRULE request from a rule observed in a dump, verbatim.
///
/// Used by the reset sweep, which deletes every rule pointing at a managed
/// table regardless of how it got there.
pub fn delete_observed(rule: RuleMessage) -> NetlinkMessage<RouteNetlinkMessage> {
    let mut request = NetlinkMessage::from(RouteNetlinkMessage::DelRule(rule));
    request.header.flags = NLM_F_REQUEST | NLM_F_ACK;
    request
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use rtnetlink::packet_core::NetlinkPayload;

    use super::*;

    fn inner(message: NetlinkMessage<RouteNetlinkMessage>) -> RouteNetlinkMessage {
        match message.payload {
            NetlinkPayload::InnerMessage(inner) => inner,
            other => panic!("not an inner message: {other:?}"),
        }
    }

    #[test]
    fn create_carries_full_prefix_and_table_priority() {
        let source = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6));
        let request = RuleRequest::new(source, 2000).create();

        assert_eq!(request.header.flags, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);

        let RouteNetlinkMessage::NewRule(rule) = inner(request) else {
            panic!("expected NewRule");
        };
        assert_eq!(rule.header.family, AddressFamily::Inet);
        assert_eq!(rule.header.src_len, 32);
        assert_eq!(rule.header.action, RuleAction::ToTable);
        assert!(rule.attributes.contains(&RuleAttribute::Source(source)));
        assert!(rule.attributes.contains(&RuleAttribute::Table(2000)));
        assert!(rule.attributes.contains(&RuleAttribute::Priority(2000)));
    }

    #[test]
    fn ipv6_rule_uses_128_bit_prefix() {
        let source = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 5));
        let request = RuleRequest::new(source, 3000).create();

        let RouteNetlinkMessage::NewRule(rule) = inner(request) else {
            panic!("expected NewRule");
        };
        assert_eq!(rule.header.family, AddressFamily::Inet6);
        assert_eq!(rule.header.src_len, 128);
    }

    #[test]
    fn delete_matches_create_without_exclusive_flags() {
        let source = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6));
        let create = RuleRequest::new(source, 2000).create();
        let delete = RuleRequest::new(source, 2000).delete();

        assert_eq!(delete.header.flags, NLM_F_REQUEST | NLM_F_ACK);

        let RouteNetlinkMessage::NewRule(created) = inner(create) else {
            panic!("expected NewRule");
        };
        let RouteNetlinkMessage::DelRule(deleted) = inner(delete) else {
            panic!("expected DelRule");
        };
        assert_eq!(created, deleted);
    }
}
