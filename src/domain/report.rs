//! Incident report model.
//!
//! Reports are identified by a folio (`F-NNNNN`) assigned on submission.
//! Wire names follow the mobile client's camelCase contract.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::IncidentType;
use crate::error::ServiceError;

/// Lifecycle status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Received and awaiting triage. Initial status of every report.
    EnRevision,
    /// Assigned to a crew.
    EnProceso,
    /// Fixed.
    Resuelto,
    /// Flagged as critical.
    Critico,
}

impl ReportStatus {
    /// Every allowed status.
    pub const ALL: [Self; 4] = [Self::EnRevision, Self::EnProceso, Self::Resuelto, Self::Critico];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnRevision => "en_revision",
            Self::EnProceso => "en_proceso",
            Self::Resuelto => "resuelto",
            Self::Critico => "critico",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or(ServiceError::InvalidStatus)
    }
}

/// A filed incident report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Folio identifier, e.g. `F-10422`.
    pub id: String,
    /// Incident category.
    pub incident_type: IncidentType,
    /// Free-form description.
    pub description: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Current status.
    pub status: ReportStatus,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for a new report submission.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Catalog identifier of the incident type.
    pub incident_type_id: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

impl NewReport {
    /// Checks required fields and coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidRequest`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.incident_type_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "incidentTypeId is required".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ServiceError::InvalidRequest(
                "latitude must be within [-90, 90]".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ServiceError::InvalidRequest(
                "longitude must be within [-180, 180]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tracking view of a folio.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolioStatus {
    /// Folio identifier.
    pub folio: String,
    /// Current status.
    pub status: ReportStatus,
    /// Time of this lookup.
    pub last_update: DateTime<Utc>,
    /// Human-readable history entries.
    pub history: Vec<String>,
}

impl FolioStatus {
    /// Builds the tracking view for `report`.
    #[must_use]
    pub fn for_report(report: &Report) -> Self {
        let mut history = vec!["Reporte recibido".to_string()];
        if report.status != ReportStatus::EnRevision {
            history.push("Asignado a cuadrilla".to_string());
        }
        if report.status == ReportStatus::Resuelto {
            history.push("Incidente resuelto".to_string());
        }
        Self {
            folio: report.id.clone(),
            status: report.status,
            last_update: Utc::now(),
            history,
        }
    }
}

/// One page of reports, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    /// Reports on this page.
    pub items: Vec<Report>,
    /// Whether more pages follow.
    pub has_more: bool,
    /// Zero-based page index.
    pub page: usize,
    /// Total matching reports.
    pub total_count: usize,
}

/// Status counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// Reports still `en_revision`.
    pub pending_reports: usize,
    /// Reports `resuelto`.
    pub resolved_reports: usize,
    /// Reports `critico`.
    pub critical_incidents: usize,
}

impl DashboardMetrics {
    /// Tallies the statuses of `reports`.
    pub fn tally<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        reports
            .into_iter()
            .fold(Self::default(), |mut metrics, report| {
                match report.status {
                    ReportStatus::EnRevision => metrics.pending_reports += 1,
                    ReportStatus::Resuelto => metrics.resolved_reports += 1,
                    ReportStatus::Critico => metrics.critical_incidents += 1,
                    ReportStatus::EnProceso => {}
                }
                metrics
            })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn report(status: ReportStatus) -> Report {
        Report {
            id: "F-10001".to_string(),
            incident_type: IncidentType {
                id: "pothole".to_string(),
                name: "Bache".to_string(),
                requires_evidence: true,
            },
            description: "Bache profundo".to_string(),
            latitude: 19.43,
            longitude: -99.13,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("en_proceso".parse::<ReportStatus>(), Ok(ReportStatus::EnProceso));
        assert_eq!(" critico ".parse::<ReportStatus>(), Ok(ReportStatus::Critico));
        assert_eq!(
            "closed".parse::<ReportStatus>(),
            Err(ServiceError::InvalidStatus)
        );
    }

    #[test]
    fn report_serializes_camel_case() {
        let Ok(json) = serde_json::to_value(report(ReportStatus::EnRevision)) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("en_revision"));
        assert_eq!(
            json.pointer("/incidentType/requiresEvidence")
                .and_then(serde_json::Value::as_bool),
            Some(true)
        );
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn new_report_validation() {
        let mut input = NewReport {
            incident_type_id: "pothole".to_string(),
            description: String::new(),
            latitude: 19.4,
            longitude: -99.1,
        };
        assert!(input.validate().is_ok());

        input.latitude = 120.0;
        assert!(matches!(
            input.validate(),
            Err(ServiceError::InvalidRequest(_))
        ));

        input.latitude = 0.0;
        input.incident_type_id = "  ".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn folio_history_grows_with_status() {
        assert_eq!(FolioStatus::for_report(&report(ReportStatus::EnRevision)).history.len(), 1);
        assert_eq!(FolioStatus::for_report(&report(ReportStatus::Resuelto)).history.len(), 3);
    }

    #[test]
    fn dashboard_tally_counts_statuses() {
        let reports = [
            report(ReportStatus::EnRevision),
            report(ReportStatus::EnRevision),
            report(ReportStatus::Resuelto),
            report(ReportStatus::Critico),
            report(ReportStatus::EnProceso),
        ];
        let metrics = DashboardMetrics::tally(&reports);
        assert_eq!(
            metrics,
            DashboardMetrics {
                pending_reports: 2,
                resolved_reports: 1,
                critical_incidents: 1,
            }
        );
    }
}
