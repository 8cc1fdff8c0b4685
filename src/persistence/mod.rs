//! Persistence layer: PostgreSQL-backed repositories.
//!
//! Enabled with `PERSISTENCE_ENABLED=true`. Otherwise the services run on
//! the in-memory stores from [`crate::domain`]. Schema lives in
//! `migrations/` and is applied by [`postgres::connect`].

pub mod models;
pub mod postgres;

pub use postgres::{PostgresReportRepository, PostgresUserRepository, connect};
