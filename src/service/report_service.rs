//! Report submission, folio tracking, and administration.
//!
//! Submission and folio lookup are the hot paths and each get their own
//! [`Dispatcher`] with a bounded queue scaled to the worker count. The
//! remaining operations are single repository calls and run inline after a
//! context check.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::context::CallContext;
use crate::dispatch::{Dispatcher, JobHandler, PoolOptions, QueueMode};
use crate::domain::{
    DashboardMetrics, FolioStatus, IncidentType, NewReport, Report, ReportPage, ReportRepository,
    ReportStatus, find_incident_type,
};
use crate::error::ServiceError;
use crate::observability::{REPORT_LOOKUP_QUEUE_DEPTH, REPORT_SUBMIT_QUEUE_DEPTH, SharedMetrics};

/// Smallest and largest folio number, inclusive.
pub const FOLIO_RANGE: std::ops::RangeInclusive<u32> = 10_000..=99_999;

/// Page size used when the caller passes zero.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller can request.
pub const MAX_PAGE_SIZE: usize = 100;

const FOLIO_ATTEMPTS: usize = 8;

/// Formats a folio number as `F-NNNNN`.
#[must_use]
pub fn format_folio(number: u32) -> String {
    format!("F-{number:05}")
}

struct Submit {
    reports: Arc<dyn ReportRepository>,
}

impl Submit {
    async fn unused_folio(&self) -> Result<String, ServiceError> {
        for _ in 0..FOLIO_ATTEMPTS {
            let folio = format_folio(rand::rng().random_range(FOLIO_RANGE));
            match self.reports.find(&folio).await {
                Err(ServiceError::ReportNotFound) => return Ok(folio),
                Ok(_) => tracing::debug!(folio = %folio, "folio collision, retrying"),
                Err(err) => return Err(err),
            }
        }
        Err(ServiceError::Persistence(
            "could not allocate a free folio".to_string(),
        ))
    }
}

#[async_trait]
impl JobHandler for Submit {
    type Input = NewReport;
    type Output = Result<Report, ServiceError>;

    async fn handle(&self, _ctx: &CallContext, input: NewReport) -> Self::Output {
        input.validate()?;
        let type_id = input.incident_type_id.trim();
        let incident_type =
            find_incident_type(type_id).unwrap_or_else(|| IncidentType::unlisted(type_id));

        let report = Report {
            id: self.unused_folio().await?,
            incident_type,
            description: input.description.trim().to_string(),
            latitude: input.latitude,
            longitude: input.longitude,
            status: ReportStatus::EnRevision,
            created_at: Utc::now(),
        };
        let stored = self.reports.create(report).await?;
        tracing::info!(
            folio = %stored.id,
            incident_type = %stored.incident_type.id,
            "report submitted"
        );
        Ok(stored)
    }
}

struct Lookup {
    reports: Arc<dyn ReportRepository>,
}

#[async_trait]
impl JobHandler for Lookup {
    type Input = String;
    type Output = Result<FolioStatus, ServiceError>;

    async fn handle(&self, _ctx: &CallContext, folio: String) -> Self::Output {
        let report = self.reports.find(folio.trim()).await?;
        Ok(FolioStatus::for_report(&report))
    }
}

/// Report lifecycle operations.
pub struct ReportService {
    submit: Dispatcher<Submit>,
    lookup: Dispatcher<Lookup>,
    reports: Arc<dyn ReportRepository>,
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("submit", &self.submit)
            .field("lookup", &self.lookup)
            .finish_non_exhaustive()
    }
}

impl ReportService {
    /// Starts the submission and lookup pools over `reports`.
    #[must_use]
    pub fn new(
        submit_workers: usize,
        lookup_workers: usize,
        reports: Arc<dyn ReportRepository>,
        metrics: SharedMetrics,
    ) -> Self {
        let submit = Dispatcher::new(
            PoolOptions {
                name: "report-submit",
                depth_gauge: REPORT_SUBMIT_QUEUE_DEPTH,
                workers: submit_workers,
                queue: QueueMode::scaled(submit_workers),
            },
            Submit {
                reports: Arc::clone(&reports),
            },
            Arc::clone(&metrics),
        );
        let lookup = Dispatcher::new(
            PoolOptions {
                name: "report-lookup",
                depth_gauge: REPORT_LOOKUP_QUEUE_DEPTH,
                workers: lookup_workers,
                queue: QueueMode::scaled(lookup_workers),
            },
            Lookup {
                reports: Arc::clone(&reports),
            },
            metrics,
        );
        Self {
            submit,
            lookup,
            reports,
        }
    }

    /// Validates and files a new report with a fresh folio.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidRequest`] for bad input,
    /// [`ServiceError::Persistence`] on storage failure, and
    /// [`ServiceError::Dispatch`] if `ctx` ends or the pool is closed.
    pub async fn submit(&self, ctx: &CallContext, report: NewReport) -> Result<Report, ServiceError> {
        self.submit.submit(ctx, report).await?
    }

    /// Returns the tracking view of a folio.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] for unknown folios and
    /// [`ServiceError::Dispatch`] if `ctx` ends or the pool is closed.
    pub async fn lookup(&self, ctx: &CallContext, folio: &str) -> Result<FolioStatus, ServiceError> {
        self.lookup.submit(ctx, folio.to_string()).await?
    }

    /// Lists reports newest first, optionally filtered by status.
    ///
    /// A zero `page_size` falls back to the default; larger sizes are capped.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidStatus`] if `status` is not blank and
    /// not a known status.
    pub async fn list(
        &self,
        ctx: &CallContext,
        page: usize,
        page_size: usize,
        status: Option<&str>,
    ) -> Result<ReportPage, ServiceError> {
        ctx.check()?;
        let status = match status.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<ReportStatus>()?),
        };
        let page_size = match page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        let (items, total_count) = self.reports.list(page, page_size, status).await?;
        let shown = page.saturating_mul(page_size).saturating_add(items.len());
        Ok(ReportPage {
            has_more: shown < total_count,
            items,
            page,
            total_count,
        })
    }

    /// Fetches one report.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] if absent.
    pub async fn get(&self, ctx: &CallContext, id: &str) -> Result<Report, ServiceError> {
        ctx.check()?;
        self.reports.find(id).await
    }

    /// Moves a report to a new status.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidStatus`] for unknown statuses and
    /// [`ServiceError::ReportNotFound`] if absent.
    pub async fn update_status(
        &self,
        ctx: &CallContext,
        id: &str,
        status: &str,
    ) -> Result<Report, ServiceError> {
        ctx.check()?;
        let status: ReportStatus = status.parse()?;
        let report = self.reports.update_status(id, status).await?;
        tracing::info!(folio = %report.id, status = %status, "report status changed");
        Ok(report)
    }

    /// Deletes a report.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ReportNotFound`] if absent.
    pub async fn delete(&self, ctx: &CallContext, id: &str) -> Result<(), ServiceError> {
        ctx.check()?;
        self.reports.delete(id).await?;
        tracing::info!(folio = %id, "report deleted");
        Ok(())
    }

    /// Counts reports per dashboard bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] on storage failure.
    pub async fn dashboard_metrics(&self, ctx: &CallContext) -> Result<DashboardMetrics, ServiceError> {
        ctx.check()?;
        self.reports.metrics().await
    }

    /// Closes both pools and waits for their workers.
    pub async fn shutdown(&self) {
        self.submit.shutdown().await;
        self.lookup.shutdown().await;
    }
}
