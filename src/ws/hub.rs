//! Sharded session registry with a fan-out worker pool.
//!
//! Sessions live in `2^shard_power` shards keyed by `id & mask`, each
//! behind its own `RwLock`, so registration only contends with fan-out on
//! one shard. Publishers push serialized payloads onto a bounded MPMC
//! queue with [`Hub::broadcast`], which never blocks: a full queue is
//! reported as [`HubError::QueueFull`]. A fixed set of workers pulls from
//! the queue and copies each payload into every session's drop-oldest
//! buffer.
//!
//! # Lifecycle
//!
//! `Running` → `Draining` (queue closed, workers finishing queued
//! payloads) → `Closed` (every session closed and removed). There is no
//! way back to `Running`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::Client;
use super::messages::Event;
use super::outbound::PushOutcome;
use super::transport::Transport;
use crate::context::{CallContext, ContextError};
use crate::domain::Report;
use crate::error::HubError;
use crate::observability::{BROADCAST_LATENCY_SECONDS, SharedMetrics, WS_SESSIONS_ACTIVE};

const MAX_SHARD_POWER: u32 = 16;

/// Hub sizing and session timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Shard count is `2^shard_power`.
    pub shard_power: u32,
    /// Number of fan-out workers.
    pub workers: usize,
    /// Capacity of the shared broadcast queue.
    pub queue_size: usize,
    /// Capacity of each session's outbound buffer.
    pub client_buffer: usize,
    /// Read deadline, extended by every pong.
    pub pong_wait: Duration,
    /// Interval between liveness pings. Should be shorter than `pong_wait`.
    pub ping_interval: Duration,
    /// Deadline for a single outbound write.
    pub write_wait: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            shard_power: 4,
            workers: 4,
            queue_size: 1024,
            client_buffer: 64,
            pong_wait: Duration::from_secs(55),
            ping_interval: Duration::from_secs(45),
            write_wait: Duration::from_secs(5),
        }
    }
}

impl HubConfig {
    /// Sizing used by the HTTP server.
    #[must_use]
    pub fn server() -> Self {
        Self {
            shard_power: 8,
            workers: 8,
            queue_size: 4096,
            client_buffer: 128,
            ..Self::default()
        }
    }

    /// Replaces zero values with defaults and caps the shard count.
    #[must_use]
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let or_default = |value: Duration, fallback: Duration| {
            if value.is_zero() { fallback } else { value }
        };
        Self {
            shard_power: match self.shard_power {
                0 => defaults.shard_power,
                power => power.min(MAX_SHARD_POWER),
            },
            workers: if self.workers == 0 { defaults.workers } else { self.workers },
            queue_size: if self.queue_size == 0 {
                defaults.queue_size
            } else {
                self.queue_size
            },
            client_buffer: if self.client_buffer == 0 {
                defaults.client_buffer
            } else {
                self.client_buffer
            },
            pong_wait: or_default(self.pong_wait, defaults.pong_wait),
            ping_interval: or_default(self.ping_interval, defaults.ping_interval),
            write_wait: or_default(self.write_wait, defaults.write_wait),
        }
    }
}

/// Observable lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// Accepting broadcasts.
    Running,
    /// Queue closed; workers are finishing queued payloads.
    Draining,
    /// Every session has been closed.
    Closed,
}

type Shard = RwLock<HashMap<u64, Arc<Client>>>;

pub(crate) struct HubCore {
    shards: Arc<[Shard]>,
    mask: u64,
    queue: Sender<Bytes>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    active: AtomicUsize,
    sweeping: AtomicBool,
    drained: CancellationToken,
    config: HubConfig,
    metrics: SharedMetrics,
}

impl fmt::Debug for HubCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCore")
            .field("shards", &self.shards.len())
            .field("queued", &self.queue.len())
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HubCore {
    #[allow(clippy::indexing_slicing, clippy::cast_possible_truncation)]
    fn shard(&self, id: u64) -> &Shard {
        // mask < shards.len() and shards.len() <= 2^16
        &self.shards[(id & self.mask) as usize]
    }

    fn publish_active(&self, active: usize) {
        #[allow(clippy::cast_precision_loss)]
        self.metrics.set_gauge(WS_SESSIONS_ACTIVE, active as f64);
    }

    /// Removes `client` from its shard, if still present, and closes it.
    ///
    /// `active` and its gauge only change under a shard write guard, so the
    /// counter always equals the number of sessions held by the shards.
    pub(crate) fn unregister(&self, client: &Client) {
        {
            let mut shard = self.shard(client.id()).write();
            if shard.remove(&client.id()).is_some() {
                let active = self.active.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
                self.publish_active(active);
            }
        }
        client.close();
    }

    async fn drain(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "fan-out worker panicked");
            }
        }

        self.sweeping.store(true, Ordering::Release);
        let mut closed = 0usize;
        for shard in self.shards.iter() {
            let mut sessions = shard.write();
            let swept = sessions.len();
            for (_, client) in sessions.drain() {
                client.close();
            }
            let active = self.active.fetch_sub(swept, Ordering::AcqRel).saturating_sub(swept);
            self.publish_active(active);
            closed += swept;
        }
        self.drained.cancel();
        tracing::info!(sessions = closed, "broadcast hub closed");
    }
}

/// Handle to a broadcast hub. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Hub {
    core: Arc<HubCore>,
}

impl Hub {
    /// Creates the hub and starts its fan-out workers.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: HubConfig, metrics: SharedMetrics) -> Self {
        let config = config.normalized();
        let shard_count = 1usize << config.shard_power;
        let shards: Arc<[Shard]> = (0..shard_count).map(|_| RwLock::default()).collect();
        let (queue, rx) = async_channel::bounded(config.queue_size);

        let workers = (0..config.workers)
            .map(|worker| {
                tokio::spawn(fan_out(
                    worker,
                    Arc::clone(&shards),
                    rx.clone(),
                    Arc::clone(&metrics),
                ))
            })
            .collect();

        tracing::info!(
            shards = shard_count,
            workers = config.workers,
            queue_size = config.queue_size,
            client_buffer = config.client_buffer,
            "broadcast hub started"
        );

        Self {
            core: Arc::new(HubCore {
                shards,
                mask: (shard_count as u64) - 1,
                queue,
                workers: Mutex::new(workers),
                next_id: AtomicU64::new(1),
                active: AtomicUsize::new(0),
                sweeping: AtomicBool::new(false),
                drained: CancellationToken::new(),
                config,
                metrics,
            }),
        }
    }

    /// Registers a connection and returns its session.
    ///
    /// Never fails. Once the hub has begun closing sessions the returned
    /// client is already closed.
    pub fn register(&self, transport: Arc<dyn Transport>) -> Arc<Client> {
        let core = &self.core;
        let id = core.next_id.fetch_add(1, Ordering::Relaxed);
        let client = Arc::new(Client::new(
            id,
            transport,
            Arc::downgrade(core),
            &core.config,
        ));

        let inserted = {
            let mut shard = core.shard(id).write();
            if core.sweeping.load(Ordering::Acquire) {
                false
            } else {
                shard.insert(id, Arc::clone(&client));
                core.publish_active(core.active.fetch_add(1, Ordering::AcqRel) + 1);
                true
            }
        };

        if inserted {
            tracing::debug!(client_id = id, "ws session registered");
        } else {
            tracing::debug!(client_id = id, "hub closed, session rejected");
            client.close();
        }
        client
    }

    /// Queues `payload` for delivery to every session without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::QueueFull`] if the broadcast queue has no free
    /// slot and [`HubError::Closed`] once shutdown has started.
    pub fn broadcast(&self, payload: impl Into<Bytes>) -> Result<(), HubError> {
        self.core
            .queue
            .try_send(payload.into())
            .map_err(|err| match err {
                TrySendError::Full(_) => HubError::QueueFull,
                TrySendError::Closed(_) => HubError::Closed,
            })
    }

    /// Publishes a `report.created` event for `report`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialize`] if the envelope cannot be encoded,
    /// otherwise the same errors as [`Hub::broadcast`].
    pub fn broadcast_report(&self, report: &Report) -> Result<(), HubError> {
        let payload = serde_json::to_vec(&Event::report_created(report))?;
        self.broadcast(payload)
    }

    /// Stops accepting broadcasts, drains queued payloads, then closes every
    /// session.
    ///
    /// Safe to call repeatedly. If `ctx` ends first, draining keeps going in
    /// the background and a later call can wait for it again.
    ///
    /// # Errors
    ///
    /// Returns the context's error if it ends before draining completes.
    pub async fn shutdown(&self, ctx: &CallContext) -> Result<(), ContextError> {
        if self.core.queue.close() {
            tracing::info!(queued = self.core.queue.len(), "broadcast hub draining");
            let core = Arc::clone(&self.core);
            tokio::spawn(async move { core.drain().await });
        }

        tokio::select! {
            biased;
            () = self.core.drained.cancelled() => Ok(()),
            err = ctx.done() => Err(err),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn state(&self) -> HubState {
        if self.core.drained.is_cancelled() {
            HubState::Closed
        } else if self.core.queue.is_closed() {
            HubState::Draining
        } else {
            HubState::Running
        }
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.core.active.load(Ordering::Acquire)
    }

    /// Payloads waiting for a fan-out worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.core.queue.len()
    }

    /// Effective configuration after normalization.
    #[must_use]
    pub fn config(&self) -> HubConfig {
        self.core.config
    }
}

async fn fan_out(
    worker: usize,
    shards: Arc<[Shard]>,
    queue: Receiver<Bytes>,
    metrics: SharedMetrics,
) {
    while let Ok(payload) = queue.recv().await {
        let started = Instant::now();
        let mut displaced = 0usize;
        for shard in shards.iter() {
            let sessions = shard.read();
            for client in sessions.values() {
                if client.enqueue(payload.clone()) == PushOutcome::DisplacedOldest {
                    displaced += 1;
                }
            }
        }
        metrics.observe_histogram(BROADCAST_LATENCY_SECONDS, started.elapsed());
        if displaced > 0 {
            tracing::debug!(worker, displaced, "slow sessions dropped oldest messages");
        }
    }
    tracing::debug!(worker, "fan-out worker stopped");
}
