//! Per-session bounded outbound buffer with drop-oldest overflow.
//!
//! The buffer is a small ring: when it is full, the oldest queued message
//! is evicted to make room for the new one. Pushing never blocks, so a
//! slow session can never stall the fan-out worker that feeds it. Under
//! sustained overload a session keeps only the most recent `capacity`
//! messages, in publish order.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Result of [`OutboundBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without evicting anything.
    Queued,
    /// Stored after evicting the oldest buffered message.
    DisplacedOldest,
    /// The buffer is closed; the message was dropped.
    Closed,
}

#[derive(Debug)]
struct Ring {
    queue: VecDeque<Bytes>,
    closed: bool,
}

/// Bounded drop-oldest message buffer with async receive.
#[derive(Debug)]
pub struct OutboundBuffer {
    ring: Mutex<Ring>,
    notify: Notify,
    capacity: usize,
}

impl OutboundBuffer {
    /// Creates a buffer holding at most `capacity` messages (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueues `message` without blocking, evicting the oldest entry if full.
    pub fn push(&self, message: Bytes) -> PushOutcome {
        let outcome = {
            let mut ring = self.ring.lock();
            if ring.closed {
                return PushOutcome::Closed;
            }
            let outcome = if ring.queue.len() >= self.capacity {
                ring.queue.pop_front();
                PushOutcome::DisplacedOldest
            } else {
                PushOutcome::Queued
            };
            ring.queue.push_back(message);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Removes the oldest message if one is buffered.
    pub fn try_recv(&self) -> Option<Bytes> {
        self.ring.lock().queue.pop_front()
    }

    /// Waits for the next message. Returns `None` once the buffer is closed
    /// and empty.
    pub async fn recv(&self) -> Option<Bytes> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut ring = self.ring.lock();
                if let Some(message) = ring.queue.pop_front() {
                    return Some(message);
                }
                if ring.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Closes the buffer. Buffered messages stay readable; new pushes are
    /// dropped. Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        let first = {
            let mut ring = self.ring.lock();
            !std::mem::replace(&mut ring.closed, true)
        };
        self.notify.notify_waiters();
        first
    }

    /// Returns `true` once [`OutboundBuffer::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().queue.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().queue.is_empty()
    }

    /// Maximum number of buffered messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
