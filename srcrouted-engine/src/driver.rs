//! The engine: bootstrap, steady-state loop and reset.
//!
//! All transmission happens here. Handlers only enqueue; the engine flushes
//! the queue after every wakeup, keeping a single place where the socket is
//! written. The synchronous dump waits keep dispatching inbound messages
//! while they wait, so a dump's payload is absorbed before its
//! acknowledgement completes the wait.

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use srcrouted_wire::dump::{self, DumpKind};

use crate::handlers::{Mode, Synchronizer};
use crate::mapping::Mapping;
use crate::socket::NetlinkSocket;

/// Bound on every synchronous acknowledgement wait.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("netlink socket error: {0}")]
    Io(#[from] io::Error),
    #[error("timed out waiting for acknowledgement of request {0}")]
    AckTimeout(u32),
}

/// Owns the socket and drives the [`Synchronizer`] through its lifecycle.
pub struct Engine {
    socket: NetlinkSocket,
    sync: Synchronizer,
}

impl Engine {
    /// Open the kernel channel. Fails fast on any socket setup error.
    pub fn new(mapping: Mapping) -> Result<Self, EngineError> {
        for (interface, table) in mapping.iter() {
            tracing::info!(interface, table, "managing interface");
        }

        Ok(Self { socket: NetlinkSocket::open()?, sync: Synchronizer::new(mapping) })
    }

    /// Run until `shutdown` resolves or a fatal error occurs, then reset.
    ///
    /// Consumes the engine so the socket is released when the reset sweep is
    /// done, on every exit path.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.bootstrap().await?;

        tracing::info!("entering main loop");
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                burst = self.socket.recv_burst() => match burst {
                    Ok(messages) => {
                        for message in messages {
                            self.sync.dispatch(message);
                        }
                        if let Err(error) = self.flush() {
                            break Err(error);
                        }
                    }
                    Err(error) => break Err(error.into()),
                }
            }
        };

        if let Err(error) = &result {
            tracing::error!(%error, "main loop failed, resetting anyway");
        }
        self.reset().await;

        result
    }

    /// Replay the kernel's current state through the handlers.
    ///
    /// Operational is set before the first dump so the dump bursts flow
    /// through the same policy as runtime events, producing the initial
    /// per-address rules and route clones.
    async fn bootstrap(&mut self) -> Result<(), EngineError> {
        self.sync.set_mode(Mode::Operational);

        for kind in [DumpKind::Links, DumpKind::Addresses, DumpKind::Routes, DumpKind::Rules] {
            tracing::info!(kind = kind.as_str(), "bootstrap dump");
            self.synchronized_dump(kind).await?;
        }

        tracing::info!("bootstrap complete");
        Ok(())
    }

    /// Tear down everything pointing at a managed table.
    ///
    /// Shutdown must finish even when individual sweeps fail; errors are
    /// logged and swallowed here.
    async fn reset(&mut self) {
        self.sync.set_mode(Mode::Reset);
        tracing::info!("reset: removing managed rules and cloned routes");

        for kind in [DumpKind::Rules, DumpKind::Routes] {
            if let Err(error) = self.reset_sweep(kind).await {
                tracing::warn!(kind = kind.as_str(), %error, "reset sweep incomplete");
            }
        }

        let dropped = self.sync.queue_mut().clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded unsent requests");
        }
        tracing::info!("reset complete");
    }

    /// Dump one kind and, once the dump is acknowledged, wait for the
    /// acknowledgement of the last deletion it generated. This serializes
    /// the two sweeps: every rule deletion is acknowledged before the route
    /// sweep starts.
    async fn reset_sweep(&mut self, kind: DumpKind) -> Result<(), EngineError> {
        let dump_sequence = self.synchronized_dump(kind).await?;

        let last = self.sync.last_sequence();
        if last != dump_sequence && self.sync.acked_watermark() < last {
            self.sync.arm_ack(last);
            self.wait_for_ack(last).await?;
        }
        Ok(())
    }

    /// Issue a dump and wait for its acknowledgement, dispatching everything
    /// that arrives in between. Returns the dump's sequence number.
    async fn synchronized_dump(&mut self, kind: DumpKind) -> Result<u32, EngineError> {
        let sequence = self.sync.enqueue(dump::request(kind));
        self.sync.arm_ack(sequence);
        self.flush()?;
        self.wait_for_ack(sequence).await?;
        Ok(sequence)
    }

    /// Drive the inbound side until the armed acknowledgement arrives or the
    /// timeout elapses. Handlers may enqueue mutations while the dump
    /// streams; those are flushed as part of the wait.
    async fn wait_for_ack(&mut self, sequence: u32) -> Result<(), EngineError> {
        let deadline = Instant::now() + ACK_TIMEOUT;

        while self.sync.ack_waiting() {
            let burst = match tokio::time::timeout_at(deadline, self.socket.recv_burst()).await {
                Ok(received) => received?,
                Err(_elapsed) => {
                    self.sync.clear_ack();
                    return Err(EngineError::AckTimeout(sequence));
                }
            };

            for message in burst {
                self.sync.dispatch(message);
            }
            self.flush()?;
        }

        if let Some(code) = self.sync.take_ack_error() {
            if code != 0 {
                tracing::debug!(
                    sequence,
                    code,
                    error = %io::Error::from_raw_os_error(-code),
                    "synchronous request acknowledged with error"
                );
            }
        }
        Ok(())
    }

    /// Drain the request queue onto the socket, in order. A failed send
    /// aborts the drain; the unsent request stays owned by the queue.
    fn flush(&mut self) -> Result<(), EngineError> {
        while let Some(request) = self.sync.queue().front() {
            self.socket.send(&request.payload)?;
            tracing::trace!(
                sequence = request.sequence,
                bytes = request.payload.len(),
                "request sent"
            );
            self.sync.queue_mut().pop();
        }
        Ok(())
    }
}
