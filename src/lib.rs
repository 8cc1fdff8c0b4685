//! # citizen-gateway
//!
//! Backend for citizen incident reporting: residents file reports, track
//! them by folio, and subscribed dashboards see new reports live over
//! WebSocket.
//!
//! Every business call runs through a bounded worker pool and honours the
//! caller's cancellation and deadline. Entry points are guarded by per-key
//! rate gates, and broadcasts fan out across a sharded session registry
//! where a slow subscriber only ever loses its own oldest messages.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/) ── RateGate (dispatch/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── AuthService / CatalogService / ReportService (service/)
//!     │       └── Dispatcher worker pools (dispatch/)
//!     ├── Hub ── shards ── Client sessions (ws/)
//!     │
//!     ├── In-memory stores (domain/)
//!     └── PostgreSQL Persistence (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod observability;
pub mod persistence;
pub mod service;
pub mod ws;
