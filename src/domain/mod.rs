//! Domain layer: reports, the incident catalog, and storage seams.
//!
//! This module contains the server-side model shared by the business
//! services, the broadcast hub (which serializes [`Report`]s into
//! `report.created` events), and the HTTP layer.

pub mod incident;
pub mod report;
pub mod report_store;
pub mod repository;

pub use incident::{IncidentType, default_catalog, find_incident_type};
pub use report::{DashboardMetrics, FolioStatus, NewReport, Report, ReportPage, ReportStatus};
pub use report_store::{ReportStore, UserStore};
pub use repository::{ReportRepository, UserRepository};
