//! Bounded worker pool consuming typed jobs from a shared queue.
//!
//! A [`Dispatcher`] owns a fixed set of tokio workers draining one
//! `async-channel` queue. Every [`Dispatcher::submit`] call wraps its input
//! in a job carrying the caller's [`CallContext`] and a single-use
//! `oneshot` reply channel, so the request/response shape of a service is
//! decoupled from the pool that executes it.
//!
//! Cancellation is observed in three places:
//!
//! 1. Before the job is handed to the queue (nothing is enqueued).
//! 2. While the caller waits for the reply (a late result is discarded
//!    because the `oneshot` receiver is gone).
//! 3. By the worker on dequeue: a job whose context is already done is
//!    skipped without running the handler or replying.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::context::CallContext;
use crate::error::DispatchError;
use crate::observability::SharedMetrics;

/// Business logic executed by dispatcher workers.
///
/// One handler instance is shared by every worker of a pool.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Operation-specific input.
    type Input: Send + 'static;
    /// Operation-specific output, usually a `Result` carrying business errors.
    type Output: Send + 'static;

    /// Executes one job. `ctx` is the submitting caller's context.
    async fn handle(&self, ctx: &CallContext, input: Self::Input) -> Self::Output;
}

/// Sizing policy for a dispatcher queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Near-synchronous handoff: a producer waits until a worker is ready.
    /// Suited to low-volume operations; stalls producers under load.
    Handoff,
    /// Bounded buffer of the given capacity (minimum one).
    Bounded(usize),
}

impl QueueMode {
    /// Bounded queue sized proportionally to the worker count:
    /// `max(32, workers * 16)`.
    #[must_use]
    pub fn scaled(workers: usize) -> Self {
        Self::Bounded(workers.saturating_mul(16).max(32))
    }

    /// Channel capacity backing this mode.
    #[must_use]
    pub fn capacity(self) -> usize {
        match self {
            Self::Handoff => 1,
            Self::Bounded(n) => n.max(1),
        }
    }
}

/// Static description of a worker pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Pool name used in logs.
    pub name: &'static str,
    /// Gauge that receives the queue depth.
    pub depth_gauge: &'static str,
    /// Number of workers started eagerly (minimum one).
    pub workers: usize,
    /// Queue sizing policy.
    pub queue: QueueMode,
}

struct Job<I, O> {
    ctx: CallContext,
    input: I,
    reply: oneshot::Sender<O>,
}

/// Fixed-size worker pool with cancellable submission.
pub struct Dispatcher<H: JobHandler> {
    options: PoolOptions,
    sender: async_channel::Sender<Job<H::Input, H::Output>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: SharedMetrics,
}

impl<H: JobHandler> fmt::Debug for Dispatcher<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.options.name)
            .field("workers", &self.options.workers)
            .field("queue_depth", &self.sender.len())
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<H: JobHandler> Dispatcher<H> {
    /// Creates the pool and starts every worker immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(options: PoolOptions, handler: H, metrics: SharedMetrics) -> Self {
        let options = PoolOptions {
            workers: options.workers.max(1),
            ..options
        };
        let (sender, receiver) = async_channel::bounded(options.queue.capacity());
        let handler = Arc::new(handler);

        let handles = (0..options.workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    options,
                    worker_id,
                    receiver.clone(),
                    Arc::clone(&handler),
                    Arc::clone(&metrics),
                ))
            })
            .collect();

        tracing::debug!(
            pool = options.name,
            workers = options.workers,
            capacity = options.queue.capacity(),
            "dispatcher started"
        );

        Self {
            options,
            sender,
            workers: Mutex::new(handles),
            metrics,
        }
    }

    /// Hands `input` to the pool and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Cancelled`] or [`DispatchError::DeadlineExceeded`]
    /// when `ctx` is done before the job is queued or before its result
    /// arrives, and [`DispatchError::Closed`] once the pool is shut down.
    pub async fn submit(
        &self,
        ctx: &CallContext,
        input: H::Input,
    ) -> Result<H::Output, DispatchError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let (reply, result) = oneshot::channel();
        let job = Job {
            ctx: ctx.clone(),
            input,
            reply,
        };

        tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason.into()),
            sent = self.sender.send(job) => {
                if sent.is_err() {
                    return Err(DispatchError::Closed);
                }
            }
        }
        self.publish_depth();

        tokio::select! {
            biased;
            reason = ctx.done() => Err(reason.into()),
            output = result => output.map_err(|_| {
                // The worker dropped the reply: either it observed our
                // cancellation first or the pool went away.
                ctx.err().map_or(DispatchError::Closed, DispatchError::from)
            }),
        }
    }

    /// Number of jobs waiting in the queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.sender.len()
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.options.workers
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.options.name
    }

    /// Returns `true` once [`Dispatcher::shutdown`] has closed the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Closes the queue, lets workers drain jobs already queued, and waits
    /// for every worker to exit. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.sender.close() {
            tracing::info!(
                pool = self.options.name,
                pending = self.sender.len(),
                "dispatcher queue closed"
            );
        }
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(pool = self.options.name, error = %err, "dispatcher worker failed");
            }
        }
        self.publish_depth();
    }

    fn publish_depth(&self) {
        #[allow(clippy::cast_precision_loss)]
        let depth = self.sender.len() as f64;
        self.metrics.set_gauge(self.options.depth_gauge, depth);
    }
}

async fn run_worker<H: JobHandler>(
    options: PoolOptions,
    worker_id: usize,
    receiver: async_channel::Receiver<Job<H::Input, H::Output>>,
    handler: Arc<H>,
    metrics: SharedMetrics,
) {
    while let Ok(job) = receiver.recv().await {
        #[allow(clippy::cast_precision_loss)]
        metrics.set_gauge(options.depth_gauge, receiver.len() as f64);

        if job.ctx.is_done() {
            tracing::debug!(pool = options.name, worker_id, "skipping abandoned job");
            continue;
        }

        let output = handler.handle(&job.ctx, job.input).await;
        if job.reply.send(output).is_err() {
            tracing::debug!(pool = options.name, worker_id, "caller gone; result discarded");
        }
    }
    tracing::debug!(pool = options.name, worker_id, "dispatcher worker stopped");
}
