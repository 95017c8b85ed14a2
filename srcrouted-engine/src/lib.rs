//! The synchronization engine behind `srcrouted`.
//!
//! A single [`Engine`] owns the netlink socket for the whole process
//! lifetime and drives three phases: a bootstrap that dumps the kernel's
//! links, addresses, routes and rules through the regular event handlers, a
//! steady-state loop that mirrors main-table changes into the managed custom
//! tables, and a reset sweep on shutdown that removes everything matching a
//! managed table id.
//!
//! Everything is single-threaded; the handlers in [`Synchronizer`] never
//! touch the socket, they only enqueue requests that the engine flushes
//! after each wakeup.

pub mod driver;
pub mod handlers;
pub mod link_cache;
pub mod mapping;
pub mod queue;
pub mod sequencer;
pub mod socket;

pub use driver::{Engine, EngineError};
pub use handlers::{Mode, Synchronizer};
pub use mapping::{Mapping, MappingError};
