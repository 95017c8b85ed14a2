//! The outbound request queue.
//!
//! Handlers never write to the socket; they push serialized requests here
//! and the engine drains the queue after every wakeup. Each entry owns its
//! wire bytes, so nothing else holds on to a request once it is queued.

use std::collections::VecDeque;

use bytes::Bytes;

/// One serialized outbound request and its assigned sequence number.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub sequence: u32,
    pub payload: Bytes,
}

/// FIFO of requests awaiting transmission.
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn push(&mut self, sequence: u32, payload: Bytes) {
        self.queue.push_back(PendingRequest { sequence, payload });
    }

    /// The next request to transmit, without removing it. A request is only
    /// popped after the send succeeded, so a failed drain leaves it owned by
    /// the queue.
    pub fn front(&self) -> Option<&PendingRequest> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<PendingRequest> {
        self.queue.pop_front()
    }

    /// Drop all queued requests, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = RequestQueue::default();
        queue.push(1, Bytes::from_static(b"a"));
        queue.push(2, Bytes::from_static(b"b"));

        assert_eq!(queue.front().map(|r| r.sequence), Some(1));
        assert_eq!(queue.pop().map(|r| r.sequence), Some(1));
        assert_eq!(queue.pop().map(|r| r.sequence), Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut queue = RequestQueue::default();
        queue.push(1, Bytes::from_static(b"a"));
        queue.push(2, Bytes::from_static(b"b"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
