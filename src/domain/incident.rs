//! Incident catalog.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A category of incident citizens can report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncidentType {
    /// Stable catalog identifier (e.g. `"pothole"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether a photo is required when filing.
    pub requires_evidence: bool,
}

impl IncidentType {
    fn new(id: &str, name: &str, requires_evidence: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            requires_evidence,
        }
    }

    /// Placeholder used when a submission references an id outside the catalog.
    #[must_use]
    pub fn unlisted(id: &str) -> Self {
        Self::new(id, "Incidente", false)
    }
}

/// The built-in incident catalog.
#[must_use]
pub fn default_catalog() -> Vec<IncidentType> {
    vec![
        IncidentType::new("pothole", "Bache", true),
        IncidentType::new("lighting", "Alumbrado público", false),
        IncidentType::new("trash", "Basura acumulada", true),
    ]
}

/// Looks up `id` in the built-in catalog.
#[must_use]
pub fn find_incident_type(id: &str) -> Option<IncidentType> {
    default_catalog().into_iter().find(|kind| kind.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        let catalog = default_catalog();
        let mut ids: Vec<_> = catalog.iter().map(|kind| kind.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn find_known_and_unknown() {
        assert_eq!(find_incident_type("trash").map(|k| k.requires_evidence), Some(true));
        assert!(find_incident_type("graffiti").is_none());
        assert_eq!(IncidentType::unlisted("graffiti").name, "Incidente");
    }
}
