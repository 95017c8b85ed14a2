//! Request sequencing and acknowledgement correlation.

/// Sequence numbers start well above anything the kernel uses for its own
/// notifications, which makes the daemon's requests easy to spot in traces.
pub const INITIAL_SEQUENCE: u32 = 1_000_000_000;

/// Allocator for outbound request sequence numbers.
///
/// The counter is incremented before use, so the first allocated number is
/// `INITIAL_SEQUENCE + 1`. Wrap-around is not a concern within one process
/// lifetime.
#[derive(Debug)]
pub struct Sequencer {
    last: u32,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { last: INITIAL_SEQUENCE }
    }

    /// Allocate a fresh sequence number.
    pub fn next(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        self.last
    }

    /// The most recently allocated number.
    pub fn last(&self) -> u32 {
        self.last
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-slot correlator for synchronous acknowledgement waits.
///
/// At most one request is awaited at a time (bootstrap dumps and the reset
/// sweeps are strictly sequential), so a full pending-request map is not
/// needed.
#[derive(Debug, Default)]
pub struct AckSlot {
    awaited: Option<u32>,
    error: Option<i32>,
    waiting: bool,
}

impl AckSlot {
    /// Start waiting for the acknowledgement of `sequence`.
    pub fn arm(&mut self, sequence: u32) {
        self.awaited = Some(sequence);
        self.error = None;
        self.waiting = true;
    }

    /// Offer an acknowledgement to the slot. Returns `true` when it matches
    /// the awaited sequence and completes the wait.
    pub fn complete(&mut self, sequence: u32, code: i32) -> bool {
        if self.waiting && self.awaited == Some(sequence) {
            self.awaited = None;
            self.error = Some(code);
            self.waiting = false;
            true
        } else {
            false
        }
    }

    pub fn waiting(&self) -> bool {
        self.waiting
    }

    /// Abandon the wait (timeout).
    pub fn clear(&mut self) {
        self.awaited = None;
        self.waiting = false;
    }

    /// The error code of the last completed wait, if any.
    pub fn take_error(&mut self) -> Option<i32> {
        self.error.take()
    }
}
