//! In-memory report and user storage.
//!
//! [`ReportStore`] keeps reports in a `tokio::sync::RwLock<HashMap>`:
//! lookups and listings share the read lock, mutations take the write
//! lock. [`UserStore`] does the same for credentials.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::repository::{ReportRepository, UserRepository};
use super::{DashboardMetrics, Report, ReportStatus};
use crate::error::ServiceError;

/// Process-local report storage.
#[derive(Debug, Default)]
pub struct ReportStore {
    records: RwLock<HashMap<String, Report>>,
}

impl ReportStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if no reports are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ReportRepository for ReportStore {
    async fn create(&self, report: Report) -> Result<Report, ServiceError> {
        let mut records = self.records.write().await;
        if records.contains_key(&report.id) {
            return Err(ServiceError::Persistence(format!(
                "folio {} already exists",
                report.id
            )));
        }
        records.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn find(&self, id: &str) -> Result<Report, ServiceError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ServiceError::ReportNotFound)
    }

    async fn list(
        &self,
        page: usize,
        page_size: usize,
        status: Option<ReportStatus>,
    ) -> Result<(Vec<Report>, usize), ServiceError> {
        let mut items: Vec<Report> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|report| status.is_none_or(|wanted| report.status == wanted))
                .cloned()
                .collect()
        };
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = items.len();
        let page_items = items
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok((page_items, total))
    }

    async fn update_status(&self, id: &str, status: ReportStatus) -> Result<Report, ServiceError> {
        let mut records = self.records.write().await;
        let report = records.get_mut(id).ok_or(ServiceError::ReportNotFound)?;
        report.status = status;
        Ok(report.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(ServiceError::ReportNotFound)
    }

    async fn metrics(&self) -> Result<DashboardMetrics, ServiceError> {
        let records = self.records.read().await;
        Ok(DashboardMetrics::tally(records.values()))
    }
}

/// Process-local credential storage keyed by normalized email.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, String>>,
}

impl UserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn password_hash(&self, email: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<(), ServiceError> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(ServiceError::EmailConflict);
        }
        users.insert(email.to_string(), password_hash.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::IncidentType;

    fn report(id: &str, status: ReportStatus, age_secs: i64) -> Report {
        Report {
            id: id.to_string(),
            incident_type: IncidentType::unlisted("pothole"),
            description: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            status,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = ReportStore::new();
        let Ok(stored) = store.create(report("F-10001", ReportStatus::EnRevision, 0)).await else {
            panic!("create failed");
        };
        assert_eq!(store.find("F-10001").await, Ok(stored));
        assert_eq!(store.find("F-99999").await, Err(ServiceError::ReportNotFound));
    }

    #[tokio::test]
    async fn duplicate_folio_is_rejected() {
        let store = ReportStore::new();
        let _ = store.create(report("F-10001", ReportStatus::EnRevision, 0)).await;
        let again = store.create(report("F-10001", ReportStatus::EnRevision, 0)).await;
        assert!(matches!(again, Err(ServiceError::Persistence(_))));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let store = ReportStore::new();
        for (i, age) in [30, 10, 20].into_iter().enumerate() {
            let _ = store
                .create(report(&format!("F-1000{i}"), ReportStatus::EnRevision, age))
                .await;
        }
        let Ok((first, total)) = store.list(0, 2, None).await else {
            panic!("list failed");
        };
        assert_eq!(total, 3);
        let ids: Vec<_> = first.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["F-10001", "F-10002"]);

        let Ok((second, _)) = store.list(1, 2, None).await else {
            panic!("list failed");
        };
        assert_eq!(second.len(), 1);

        let Ok((beyond, _)) = store.list(5, 2, None).await else {
            panic!("list failed");
        };
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn list_filters_status() {
        let store = ReportStore::new();
        let _ = store.create(report("F-10001", ReportStatus::EnRevision, 0)).await;
        let _ = store.create(report("F-10002", ReportStatus::Critico, 0)).await;
        let Ok((items, total)) = store.list(0, 10, Some(ReportStatus::Critico)).await else {
            panic!("list failed");
        };
        assert_eq!(total, 1);
        assert_eq!(items.first().map(|r| r.id.as_str()), Some("F-10002"));
    }

    #[tokio::test]
    async fn update_delete_and_metrics() {
        let store = ReportStore::new();
        let _ = store.create(report("F-10001", ReportStatus::EnRevision, 0)).await;
        let _ = store.create(report("F-10002", ReportStatus::EnRevision, 0)).await;

        let Ok(updated) = store.update_status("F-10001", ReportStatus::Resuelto).await else {
            panic!("update failed");
        };
        assert_eq!(updated.status, ReportStatus::Resuelto);

        let Ok(metrics) = store.metrics().await else {
            panic!("metrics failed");
        };
        assert_eq!(metrics.pending_reports, 1);
        assert_eq!(metrics.resolved_reports, 1);

        assert!(store.delete("F-10002").await.is_ok());
        assert_eq!(store.delete("F-10002").await, Err(ServiceError::ReportNotFound));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn user_store_rejects_duplicate_email() {
        let store = UserStore::new();
        assert!(store.create("ana@example.com", "hash").await.is_ok());
        assert_eq!(
            store.create("ana@example.com", "other").await,
            Err(ServiceError::EmailConflict)
        );
        assert_eq!(
            store.password_hash("ana@example.com").await,
            Ok(Some("hash".to_string()))
        );
        assert_eq!(store.password_hash("bob@example.com").await, Ok(None));
    }
}
