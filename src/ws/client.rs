//! One live WebSocket session.
//!
//! A [`Client`] pairs an inbound read loop, which exists only to notice
//! dead connections, with an outbound write loop that drains the session's
//! [`OutboundBuffer`] and sends periodic pings. The session is torn down
//! exactly once, whichever of the hub sweep or its own read loop gets
//! there first. When the hub closes a running session, the write loop
//! flushes what is buffered and sends a close frame before the transport
//! is released.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Instant, MissedTickBehavior};

use super::hub::{HubConfig, HubCore};
use super::outbound::{OutboundBuffer, PushOutcome};
use super::transport::{Frame, Transport};
use crate::context::CallContext;

#[derive(Debug, Clone, Copy)]
struct Timings {
    pong_wait: Duration,
    ping_interval: Duration,
    write_wait: Duration,
}

/// A registered session.
pub struct Client {
    id: u64,
    transport: Arc<dyn Transport>,
    hub: Weak<HubCore>,
    outbound: Arc<OutboundBuffer>,
    closed: AtomicBool,
    running: AtomicBool,
    released: AtomicBool,
    timings: Timings,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("buffered", &self.outbound.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub(super) fn new(
        id: u64,
        transport: Arc<dyn Transport>,
        hub: Weak<HubCore>,
        config: &HubConfig,
    ) -> Self {
        Self {
            id,
            transport,
            hub,
            outbound: Arc::new(OutboundBuffer::new(config.client_buffer)),
            closed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            released: AtomicBool::new(false),
            timings: Timings {
                pong_wait: config.pong_wait,
                ping_interval: config.ping_interval,
                write_wait: config.write_wait,
            },
        }
    }

    /// Hub-assigned identifier. Never reused within one hub.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read-only view of the outbound buffer.
    ///
    /// Intended for harnesses that do not drive [`Client::run`]; a running
    /// write loop competes for the same messages.
    #[must_use]
    pub fn messages(&self) -> Messages {
        Messages {
            buffer: Arc::clone(&self.outbound),
        }
    }

    /// Returns `true` once the session has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(super) fn enqueue(&self, payload: Bytes) -> PushOutcome {
        self.outbound.push(payload)
    }

    /// Closes the outbound buffer. Idempotent.
    ///
    /// A session driven by [`Client::run`] releases its transport after the
    /// write loop has sent the close frame; otherwise it is released here.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.outbound.close();
        if !self.running.load(Ordering::SeqCst) {
            self.release();
        }
        tracing::debug!(client_id = self.id, "ws session closed");
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.transport.close();
        }
    }

    /// Drives the session until the connection dies or `ctx` is cancelled,
    /// then unregisters it from the owning hub and releases the transport.
    pub async fn run(self: Arc<Self>, ctx: CallContext) {
        self.running.store(true, Ordering::SeqCst);
        let session = ctx.child();
        let writer = tokio::spawn(Arc::clone(&self).write_loop(session.clone()));

        self.read_loop(&session).await;
        session.cancel();

        match self.hub.upgrade() {
            Some(hub) => hub.unregister(&self),
            None => self.close(),
        }
        if let Err(err) = writer.await {
            tracing::warn!(client_id = self.id, error = %err, "ws write loop panicked");
        }
        self.release();
    }

    async fn read_loop(&self, ctx: &CallContext) {
        let mut deadline = Instant::now() + self.timings.pong_wait;
        loop {
            let read = tokio::select! {
                biased;
                _ = ctx.done() => return,
                read = tokio::time::timeout_at(deadline, self.transport.read_frame()) => read,
            };
            match read {
                Ok(Ok(Frame::Pong(_))) => deadline = Instant::now() + self.timings.pong_wait,
                Ok(Ok(Frame::Close)) => {
                    tracing::debug!(client_id = self.id, "peer closed ws session");
                    return;
                }
                // Inbound data is not part of the protocol.
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    tracing::debug!(client_id = self.id, error = %err, "ws read failed");
                    return;
                }
                Err(_) => {
                    tracing::debug!(client_id = self.id, "pong deadline elapsed");
                    return;
                }
            }
        }
    }

    async fn write_loop(self: Arc<Self>, ctx: CallContext) {
        let period = self.timings.ping_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                biased;
                _ = ctx.done() => return,
                next = self.outbound.recv() => match next {
                    Some(payload) => Frame::from_payload(payload),
                    None => Frame::Close,
                },
                _ = ticker.tick() => Frame::Ping(Bytes::new()),
            };
            let closing = frame == Frame::Close;

            match tokio::time::timeout(self.timings.write_wait, self.transport.write_frame(frame))
                .await
            {
                Ok(Ok(())) if !closing => {}
                Ok(Ok(())) => {
                    ctx.cancel();
                    return;
                }
                Ok(Err(err)) => {
                    tracing::debug!(client_id = self.id, error = %err, "ws write failed");
                    ctx.cancel();
                    return;
                }
                Err(_) => {
                    tracing::debug!(client_id = self.id, "ws write deadline elapsed");
                    ctx.cancel();
                    return;
                }
            }
        }
    }
}

/// Receiving end of a session's outbound buffer.
#[derive(Debug, Clone)]
pub struct Messages {
    buffer: Arc<OutboundBuffer>,
}

impl Messages {
    /// Waits for the next buffered message; `None` after the session closes
    /// and the buffer is empty.
    pub async fn recv(&self) -> Option<Bytes> {
        self.buffer.recv().await
    }

    /// Takes the next buffered message without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<Bytes> {
        self.buffer.try_recv()
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
