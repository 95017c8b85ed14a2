//! Builders for cloned routes.
//!
//! The daemon never synthesizes routes. It copies a route observed in the
//! main table verbatim, rewrites the table id, and replays it as a create or
//! delete. That keeps gateway, metric, scope and every other attribute
//! byte-for-byte identical to what the kernel announced.

use rtnetlink::packet_core::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkMessage,
};
use rtnetlink::packet_route::RouteNetlinkMessage;
use rtnetlink::packet_route::route::{RouteAttribute, RouteHeader, RouteMessage};

/// A main-table route re-targeted at a custom table.
#[derive(Debug, Clone)]
pub struct RouteClone {
    message: RouteMessage,
}

impl RouteClone {
    /// Copy `message` and rewrite its table to `table`.
    ///
    /// The legacy 8-bit header field is cleared; the RTA_TABLE attribute
    /// carries the full 32-bit id.
    pub fn new(mut message: RouteMessage, table: u32) -> Self {
        message.header.table = if table < 256 {
            table as u8
        } else {
            RouteHeader::RT_TABLE_UNSPEC
        };
        message.attributes.retain(|attr| !matches!(attr, RouteAttribute::Table(_)));
        message.attributes.push(RouteAttribute::Table(table));

        Self { message }
    }

    /// Build the RTM_NEWROUTE request installing the clone.
    pub fn create(self) -> NetlinkMessage<RouteNetlinkMessage> {
        let mut request = NetlinkMessage::from(RouteNetlinkMessage::NewRoute(self.message));
        request.header.flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
        request
    }

    /// Build the RTM_DELROUTE request removing the clone.
    pub fn delete(self) -> NetlinkMessage<RouteNetlinkMessage> {
        let mut request = NetlinkMessage::from(RouteNetlinkMessage::DelRoute(self.message));
        request.header.flags = NLM_F_REQUEST | NLM_F_ACK;
        request
    }
}

/// Build an RTM_DELROUTE request from a route observed in a dump, verbatim.
///
/// Used by the reset sweep against routes already sitting in a managed
/// custom table.
pub fn delete_observed(route: RouteMessage) -> NetlinkMessage<RouteNetlinkMessage> {
    let mut request = NetlinkMessage::from(RouteNetlinkMessage::DelRoute(route));
    request.header.flags = NLM_F_REQUEST | NLM_F_ACK;
    request
}
