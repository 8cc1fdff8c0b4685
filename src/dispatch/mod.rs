//! Concurrent dispatch layer: worker pools and admission control.
//!
//! Every business capability (authentication, catalog retrieval, report
//! submission and lookup) runs on its own [`Dispatcher`]. Abuse-prone
//! operations are additionally guarded by a [`RateGate`] before a job is
//! submitted.

pub mod dispatcher;
pub mod rate_gate;

pub use dispatcher::{Dispatcher, JobHandler, PoolOptions, QueueMode};
pub use rate_gate::RateGate;
