//! Sequence numbering and the table of requests awaiting a response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use lightify_protocol::CommandCode;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};

/// Per-connection sequence counter. Wraps on overflow.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU32);

impl SequenceCounter {
    pub fn new(start: u32) -> Self {
        Self(AtomicU32::new(start))
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Waiter {
    command: CommandCode,
    deadline: Instant,
    reply: oneshot::Sender<Vec<u8>>,
}

/// Requests awaiting a response, keyed by sequence number.
///
/// Each waiter has a deadline; expired waiters are swept whenever a new
/// request is registered, so abandoned sequence numbers do not accumulate.
/// Once closed, the table refuses new waiters.
#[derive(Debug)]
pub struct PendingRequests {
    waiters: HashMap<u32, Waiter>,
    max_pending: usize,
    closed: bool,
}

impl PendingRequests {
    pub fn new(max_pending: usize) -> Self {
        Self {
            waiters: HashMap::new(),
            max_pending,
            closed: false,
        }
    }

    /// Registers a request and returns the receiver its response frame will
    /// be delivered on.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` once the table is closed, `TooManyPending` if it is
    /// full after expiring stale entries.
    pub fn insert(
        &mut self,
        sequence: u32,
        command: CommandCode,
        deadline: Instant,
    ) -> GatewayResult<oneshot::Receiver<Vec<u8>>> {
        if self.closed {
            return Err(GatewayError::ConnectionClosed);
        }
        self.expire(Instant::now());
        if self.waiters.len() >= self.max_pending {
            return Err(GatewayError::TooManyPending {
                max: self.max_pending,
            });
        }

        let (reply, receiver) = oneshot::channel();
        let waiter = Waiter {
            command,
            deadline,
            reply,
        };
        if let Some(previous) = self.waiters.insert(sequence, waiter) {
            warn!(
                sequence,
                command = %previous.command,
                "Sequence number reused while still pending"
            );
        }
        Ok(receiver)
    }

    /// Delivers a response frame to its waiter.
    ///
    /// Returns false if nobody is waiting for `sequence` any more.
    pub fn complete(&mut self, sequence: u32, frame: Vec<u8>) -> bool {
        match self.waiters.remove(&sequence) {
            Some(waiter) => waiter.reply.send(frame).is_ok(),
            None => false,
        }
    }

    /// Removes a waiter without answering it.
    pub fn cancel(&mut self, sequence: u32) -> bool {
        self.waiters.remove(&sequence).is_some()
    }

    /// Drops every waiter whose deadline is not after `now`.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.waiters.len();
        self.waiters.retain(|sequence, waiter| {
            let alive = waiter.deadline > now;
            if !alive {
                debug!(sequence = *sequence, command = %waiter.command, "Expired pending request");
            }
            alive
        });
        before - self.waiters.len()
    }

    /// Drops every waiter; their receivers observe a closed channel.
    pub fn clear(&mut self) {
        self.waiters.clear();
    }

    /// Drops every waiter and refuses new ones. Called when the reader stops.
    pub fn close(&mut self) {
        self.closed = true;
        self.waiters.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.waiters.contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
