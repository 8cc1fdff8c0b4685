//! Server-to-client event envelopes.

use serde::Serialize;

use crate::domain::Report;

/// Event type emitted after a report is accepted.
pub const REPORT_CREATED: &str = "report.created";

/// `{ "type": ..., "payload": ... }` envelope pushed to every session.
#[derive(Debug, Clone, Serialize)]
pub struct Event<'a, T: Serialize> {
    /// Event discriminator, e.g. `report.created`.
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// Event body.
    pub payload: &'a T,
}

impl<'a> Event<'a, Report> {
    /// Wraps a freshly created report.
    #[must_use]
    pub fn report_created(report: &'a Report) -> Self {
        Self {
            event_type: REPORT_CREATED,
            payload: report,
        }
    }
}
