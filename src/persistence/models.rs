//! Row shapes for the `reports` table.

use chrono::{DateTime, Utc};

use crate::domain::{IncidentType, Report};
use crate::error::ServiceError;

/// Column list shared by every query that returns full report rows.
pub const REPORT_COLUMNS: &str = "id, incident_type_id, incident_type_name, \
     incident_type_requires_evidence, description, latitude, longitude, status, created_at";

/// Raw tuple decoded from [`REPORT_COLUMNS`].
pub type ReportTuple = (
    String,
    String,
    String,
    bool,
    String,
    f64,
    f64,
    String,
    DateTime<Utc>,
);

/// A stored report row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Folio.
    pub id: String,
    /// Incident type identifier.
    pub incident_type_id: String,
    /// Incident type display name at submission time.
    pub incident_type_name: String,
    /// Whether the incident type required evidence.
    pub incident_type_requires_evidence: bool,
    /// Free-form description.
    pub description: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Status in its wire form.
    pub status: String,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<ReportTuple> for ReportRow {
    fn from(
        (
            id,
            incident_type_id,
            incident_type_name,
            incident_type_requires_evidence,
            description,
            latitude,
            longitude,
            status,
            created_at,
        ): ReportTuple,
    ) -> Self {
        Self {
            id,
            incident_type_id,
            incident_type_name,
            incident_type_requires_evidence,
            description,
            latitude,
            longitude,
            status,
            created_at,
        }
    }
}

impl From<&Report> for ReportRow {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id.clone(),
            incident_type_id: report.incident_type.id.clone(),
            incident_type_name: report.incident_type.name.clone(),
            incident_type_requires_evidence: report.incident_type.requires_evidence,
            description: report.description.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            status: report.status.as_str().to_string(),
            created_at: report.created_at,
        }
    }
}

impl TryFrom<ReportRow> for Report {
    type Error = ServiceError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            ServiceError::Persistence(format!("report {} has unknown status {:?}", row.id, row.status))
        })?;
        Ok(Self {
            id: row.id,
            incident_type: IncidentType {
                id: row.incident_type_id,
                name: row.incident_type_name,
                requires_evidence: row.incident_type_requires_evidence,
            },
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
            status,
            created_at: row.created_at,
        })
    }
}
