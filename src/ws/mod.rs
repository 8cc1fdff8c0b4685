//! Realtime layer: the sharded broadcast hub and its WebSocket sessions.
//!
//! The `/ws` endpoint registers each upgraded connection with the [`Hub`];
//! successful report submissions are pushed to every live session as
//! `report.created` events.

pub mod client;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod outbound;
pub mod transport;

pub use client::{Client, Messages};
pub use hub::{Hub, HubConfig, HubState};
pub use messages::{Event, REPORT_CREATED};
pub use outbound::{OutboundBuffer, PushOutcome};
pub use transport::{Frame, Transport, WsTransport};
