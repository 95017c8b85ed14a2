//! Typed translation layer between the rtnetlink wire protocol and the
//! daemon's domain.
//!
//! Inbound, [`event::parse`] turns raw `NetlinkMessage`s from the kernel into
//! the tagged [`Event`] enum the synchronization engine dispatches on.
//! Outbound, the [`rule`], [`route`] and [`dump`] modules build the small set
//! of mutation and dump requests the daemon ever sends. Builders produce
//! plain [`NetlinkMessage`]s; sequence-number assignment and serialization
//! into an owned buffer happen in [`serialize`], so the request queue owns
//! one self-describing unit per request.

use bytes::Bytes;
use rtnetlink::packet_core::NetlinkMessage;
use rtnetlink::packet_route::RouteNetlinkMessage;

pub mod dump;
pub mod event;
pub mod route;
pub mod rule;

pub use event::Event;

/// Finalize `message` with the given sequence number and serialize it into
/// an owned buffer.
pub fn serialize(mut message: NetlinkMessage<RouteNetlinkMessage>, sequence: u32) -> Bytes {
    message.header.sequence_number = sequence;
    message.finalize();

    let mut buf = vec![0u8; message.buffer_len()];
    message.serialize(&mut buf);

    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_stamps_sequence_number() {
        let message = dump::request(dump::DumpKind::Links);
        let bytes = serialize(message, 42);

        let parsed = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&bytes).unwrap();
        assert_eq!(parsed.header.sequence_number, 42);
        assert_eq!(parsed.header.length as usize, bytes.len());
    }
}
