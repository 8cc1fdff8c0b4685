//! Report request bodies.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{NewReport, ReportStatus};
use crate::error::GatewayError;

/// Longest accepted report description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Checks the submission fields the service does not.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty or oversized
/// description.
pub fn validate_submission(report: &NewReport) -> Result<(), GatewayError> {
    let description = report.description.trim();
    if description.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "description is required".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(GatewayError::InvalidRequest(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

/// Request body for `PATCH /reports/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    /// One of `en_revision`, `en_proceso`, `resuelto`, `critico`.
    pub status: String,
}

impl StatusUpdateRequest {
    /// Checks that `status` names a known report status.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ServiceError::InvalidStatus`] otherwise.
    pub fn validate(&self) -> Result<ReportStatus, GatewayError> {
        Ok(self.status.trim().parse::<ReportStatus>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    fn submission(description: &str) -> NewReport {
        NewReport {
            incident_type_id: "pothole".to_string(),
            description: description.to_string(),
            latitude: 19.43,
            longitude: -99.13,
        }
    }

    #[test]
    fn description_bounds() {
        assert!(validate_submission(&submission("bache profundo")).is_ok());
        assert!(validate_submission(&submission("   ")).is_err());
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(validate_submission(&submission(&long)).is_err());
    }

    #[test]
    fn status_update_parses_known_values() {
        let req = StatusUpdateRequest {
            status: " resuelto ".to_string(),
        };
        assert_eq!(req.validate().ok(), Some(ReportStatus::Resuelto));

        let req = StatusUpdateRequest {
            status: "archivado".to_string(),
        };
        assert!(matches!(
            req.validate(),
            Err(GatewayError::Service(ServiceError::InvalidStatus))
        ));
    }
}
