//! Shared application state injected into all Axum handlers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::GatewayConfig;
use crate::context::CallContext;
use crate::dispatch::RateGate;
use crate::domain::{ReportRepository, UserRepository};
use crate::observability::SharedMetrics;
use crate::service::{AuthService, CatalogService, ReportService};
use crate::ws::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Real-time broadcast hub behind `/ws`.
    pub hub: Hub,
    /// Login, registration, and bearer tokens.
    pub auth: Arc<AuthService>,
    /// Incident-type catalog.
    pub catalog: Arc<CatalogService>,
    /// Report submission, lookup, and administration.
    pub reports: Arc<ReportService>,
    /// Admission gate for `/auth/*`.
    pub auth_gate: Arc<RateGate>,
    /// Admission gate for `POST /reports`.
    pub report_gate: Arc<RateGate>,
    /// Deadline applied to each request's context.
    pub request_timeout: Duration,
    /// Shared secret required by the admin dashboard, if configured.
    pub admin_api_key: Option<Arc<str>>,
    /// Prometheus renderer for `/metrics`. `None` when metrics are off.
    pub metrics_handle: Option<PrometheusHandle>,
    /// Parent of every request and session context. Cancelled on shutdown.
    pub root_ctx: CallContext,
}

impl AppState {
    /// Starts the hub and every worker pool sized from `config`.
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        users: Arc<dyn UserRepository>,
        reports: Arc<dyn ReportRepository>,
        metrics: SharedMetrics,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let hub = Hub::new(config.hub, Arc::clone(&metrics));
        let auth = AuthService::new(
            config.auth_workers,
            config.token_ttl,
            users,
            Arc::clone(&metrics),
        );
        let catalog = CatalogService::new(config.catalog_workers, Arc::clone(&metrics));
        let reports = ReportService::new(
            config.report_submit_workers,
            config.report_lookup_workers,
            reports,
            metrics,
        );

        Self {
            hub,
            auth: Arc::new(auth),
            catalog: Arc::new(catalog),
            reports: Arc::new(reports),
            auth_gate: Arc::new(RateGate::new(
                config.auth_rate_limit.requests,
                config.auth_rate_limit.window,
            )),
            report_gate: Arc::new(RateGate::new(
                config.report_rate_limit.requests,
                config.report_rate_limit.window,
            )),
            request_timeout: config.request_timeout,
            admin_api_key: config.admin_api_key.as_deref().map(Arc::from),
            metrics_handle,
            root_ctx: CallContext::background(),
        }
    }

    /// Context for one request, bounded by the configured timeout.
    #[must_use]
    pub fn request_context(&self) -> CallContext {
        self.root_ctx.with_timeout(self.request_timeout)
    }

    /// Drains the hub within `grace`, then closes every worker pool.
    ///
    /// Live sessions and in-flight requests see their contexts cancelled.
    pub async fn shutdown(&self, grace: Duration) {
        let ctx = CallContext::background().with_timeout(grace);
        if let Err(err) = self.hub.shutdown(&ctx).await {
            tracing::warn!(error = %err, "hub did not drain before the grace period ended");
        }
        self.root_ctx.cancel();
        self.auth.shutdown().await;
        self.catalog.shutdown().await;
        self.reports.shutdown().await;
        tracing::info!("application state shut down");
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("hub", &self.hub)
            .field("request_timeout", &self.request_timeout)
            .field("auth_gate", &self.auth_gate.is_enabled())
            .field("report_gate", &self.report_gate.is_enabled())
            .field("metrics", &self.metrics_handle.is_some())
            .finish_non_exhaustive()
    }
}
