//! Event handlers and the synchronization policy.
//!
//! [`Synchronizer`] holds all process state except the socket: the mapping,
//! the interface cache, the sequencer, the acknowledgement slot and the
//! request queue. Handlers decide which mutations to enqueue based on the
//! current [`Mode`]; they never perform I/O, which keeps the whole policy
//! drivable from tests with synthetic messages.

use std::io;

use rtnetlink::packet_core::NetlinkMessage;
use rtnetlink::packet_route::RouteNetlinkMessage;
use rtnetlink::packet_route::route::RouteHeader;
use srcrouted_wire::event::{self, AddressEvent, Event, RouteEvent, RuleEvent};
use srcrouted_wire::route::{self, RouteClone};
use srcrouted_wire::rule::{self, RuleRequest};

use crate::link_cache::LinkCache;
use crate::mapping::Mapping;
use crate::queue::RequestQueue;
use crate::sequencer::{AckSlot, Sequencer, INITIAL_SEQUENCE};

/// The table the kernel consults by default; the only table mirrored from.
pub const MAIN_TABLE: u32 = RouteHeader::RT_TABLE_MAIN as u32;

/// Operating mode. The mode decides how the same observed event translates
/// into emitted mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Before bootstrap. No mutations are ever emitted.
    Undefined,
    /// Normal operation: mirror main-table state into custom tables.
    Operational,
    /// Shutdown sweep: delete everything in the custom tables.
    Reset,
}

/// The mode-driven state machine translating kernel events into queued
/// mutations.
#[derive(Debug)]
pub struct Synchronizer {
    mapping: Mapping,
    links: LinkCache,
    sequencer: Sequencer,
    ack: AckSlot,
    /// Highest acknowledged sequence number of our own requests.
    acked: u32,
    queue: RequestQueue,
    mode: Mode,
}

impl Synchronizer {
    pub fn new(mapping: Mapping) -> Self {
        Self {
            mapping,
            links: LinkCache::default(),
            sequencer: Sequencer::new(),
            ack: AckSlot::default(),
            acked: INITIAL_SEQUENCE,
            queue: RequestQueue::default(),
            mode: Mode::Undefined,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        tracing::debug!(from = ?self.mode, to = ?mode, "mode transition");
        self.mode = mode;
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut RequestQueue {
        &mut self.queue
    }

    /// Most recently allocated sequence number.
    pub fn last_sequence(&self) -> u32 {
        self.sequencer.last()
    }

    /// Highest sequence number the kernel has acknowledged so far.
    pub fn acked_watermark(&self) -> u32 {
        self.acked
    }

    pub fn arm_ack(&mut self, sequence: u32) {
        self.ack.arm(sequence);
    }

    pub fn ack_waiting(&self) -> bool {
        self.ack.waiting()
    }

    pub fn clear_ack(&mut self) {
        self.ack.clear();
    }

    pub fn take_ack_error(&mut self) -> Option<i32> {
        self.ack.take_error()
    }

    /// Assign a fresh sequence number, serialize and queue the request.
    pub fn enqueue(&mut self, message: NetlinkMessage<RouteNetlinkMessage>) -> u32 {
        let sequence = self.sequencer.next();
        self.queue.push(sequence, srcrouted_wire::serialize(message, sequence));
        sequence
    }

    /// Parse one inbound message and run the matching handler. Errors never
    /// escape dispatch; anything unusable has already been reduced to a log
    /// line by the parser.
    pub fn dispatch(&mut self, message: NetlinkMessage<RouteNetlinkMessage>) {
        let Some(event) = event::parse(message) else {
            return;
        };
        self.handle(event);
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::LinkAdded { index, name } => {
                tracing::debug!(index, name = name.as_deref().unwrap_or("?"), "link appeared");
                self.links.upsert(index, name);
            }
            Event::LinkRemoved { index, name } => {
                tracing::debug!(index, name = name.as_deref().unwrap_or("?"), "link gone");
                self.links.remove(index);
            }
            Event::AddressAdded(address) => self.on_address(address, false),
            Event::AddressRemoved(address) => self.on_address(address, true),
            Event::RouteAdded(route) => self.on_route(route, false),
            Event::RouteRemoved(route) => self.on_route(route, true),
            Event::RuleAdded(rule) => self.on_rule(rule),
            Event::RuleRemoved(rule) => self.on_rule(rule),
            Event::Acknowledgement { sequence, code } => self.on_acknowledgement(sequence, code),
            Event::DumpDone => tracing::trace!("dump finished"),
        }
    }

    /// One rule change per address event: create on add, delete on remove.
    fn on_address(&mut self, address: AddressEvent, removed: bool) {
        let verb = if removed { "removed" } else { "added" };
        tracing::debug!(
            index = address.index,
            address = %address.address,
            prefix_len = address.prefix_len,
            "address {verb}"
        );

        if self.mode != Mode::Operational {
            return;
        }
        if address.is_link_local() {
            tracing::trace!(address = %address.address, "skipping link-local address");
            return;
        }
        let Some(table) = self.table_for_index(address.index) else {
            tracing::trace!(index = address.index, "address on unmanaged interface");
            return;
        };

        let request = RuleRequest::new(address.address, table);
        let message = if removed { request.delete() } else { request.create() };
        let sequence = self.enqueue(message);
        tracing::info!(
            address = %address.address,
            table,
            sequence,
            "queued rule {}",
            if removed { "deletion" } else { "creation" }
        );
    }

    fn on_route(&mut self, route: RouteEvent, removed: bool) {
        match self.mode {
            Mode::Undefined => {}
            Mode::Operational => self.mirror_main_route(route, removed),
            Mode::Reset => self.sweep_custom_route(route),
        }
    }

    /// Clone a main-table route into the custom table of its output
    /// interface. Events on other tables are ignored; that includes echoes
    /// of our own clones.
    fn mirror_main_route(&mut self, route: RouteEvent, removed: bool) {
        if route.table != MAIN_TABLE {
            tracing::trace!(table = route.table, "ignoring route outside the main table");
            return;
        }
        let Some(table) = route.oif.and_then(|index| self.table_for_index(index)) else {
            tracing::trace!(oif = ?route.oif, "route on unmanaged interface");
            return;
        };

        let destination = route.destination();
        let gateway = route.gateway();
        let clone = RouteClone::new(route.message, table);
        let message = if removed { clone.delete() } else { clone.create() };
        let sequence = self.enqueue(message);
        tracing::info!(
            destination = ?destination,
            gateway = ?gateway,
            table,
            sequence,
            "queued route clone {}",
            if removed { "deletion" } else { "creation" }
        );
    }

    /// Reset sweep: any route sitting in a managed table is deleted,
    /// regardless of who put it there.
    fn sweep_custom_route(&mut self, route: RouteEvent) {
        if !self.mapping.contains_table(route.table) {
            return;
        }
        let destination = route.destination();
        let table = route.table;
        let sequence = self.enqueue(route::delete_observed(route.message));
        tracing::info!(destination = ?destination, table, sequence, "queued route removal");
    }

    /// Rules are only touched during reset. In operational mode the address
    /// event stream is the source of truth and rule events are not
    /// reconciled against it.
    fn on_rule(&mut self, rule: RuleEvent) {
        if self.mode != Mode::Reset {
            tracing::trace!(table = rule.table, "ignoring rule event");
            return;
        }
        if !self.mapping.contains_table(rule.table) {
            return;
        }
        let table = rule.table;
        let priority = rule.priority;
        let sequence = self.enqueue(rule::delete_observed(rule.message));
        tracing::info!(table, priority = ?priority, sequence, "queued rule removal");
    }

    fn on_acknowledgement(&mut self, sequence: u32, code: i32) {
        if sequence > INITIAL_SEQUENCE && sequence <= self.sequencer.last() {
            self.acked = self.acked.max(sequence);
        }

        if code != 0 {
            // Mostly benign: EEXIST while replaying state the kernel already
            // has, ENOENT while tearing down something already gone.
            tracing::debug!(
                sequence,
                code,
                error = %io::Error::from_raw_os_error(-code),
                "kernel acknowledged with error"
            );
        }

        if !self.ack.complete(sequence, code) && code == 0 {
            tracing::trace!(sequence, "acknowledgement without waiter");
        }
    }

    fn table_for_index(&self, index: u32) -> Option<u32> {
        self.links.name(index).and_then(|name| self.mapping.table_for(name))
    }
}
