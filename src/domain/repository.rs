//! Storage seams consumed by the business services.
//!
//! Services only see these traits. The in-memory stores in this module's
//! siblings back tests and single-node deployments; the PostgreSQL
//! implementations live in [`crate::persistence`].

use async_trait::async_trait;

use super::{DashboardMetrics, Report, ReportStatus};
use crate::error::ServiceError;

/// Credential storage.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Returns the stored password hash for a normalized email.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] on backend failure.
    async fn password_hash(&self, email: &str) -> Result<Option<String>, ServiceError>;

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EmailConflict`] if the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<(), ServiceError>;
}

/// Report storage.
#[async_trait]
pub trait ReportRepository: Send + Sync + 'static {
    /// Stores a new report and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] on backend failure.
    async fn create(&self, report: Report) -> Result<Report, ServiceError>;

    /// Fetches a report by folio.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] if absent.
    async fn find(&self, id: &str) -> Result<Report, ServiceError>;

    /// Returns one page (newest first) and the total matching count.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] on backend failure.
    async fn list(
        &self,
        page: usize,
        page_size: usize,
        status: Option<ReportStatus>,
    ) -> Result<(Vec<Report>, usize), ServiceError>;

    /// Changes the status of a report.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] if absent.
    async fn update_status(&self, id: &str, status: ReportStatus) -> Result<Report, ServiceError>;

    /// Deletes a report.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] if absent.
    async fn delete(&self, id: &str) -> Result<(), ServiceError>;

    /// Counts reports per dashboard bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] on backend failure.
    async fn metrics(&self) -> Result<DashboardMetrics, ServiceError>;
}
