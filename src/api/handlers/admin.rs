//! Admin dashboard handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::extract::AdminAccess;
use crate::app_state::AppState;
use crate::domain::DashboardMetrics;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /admin/dashboard/metrics`: Report counts per status bucket.
///
/// # Errors
///
/// Returns [`GatewayError`] when the caller is not authenticated, lacks
/// the admin key, or storage fails.
#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard/metrics",
    tag = "Admin",
    summary = "Dashboard metrics",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Status counts", body = DashboardMetrics),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Admin key required", body = ErrorResponse),
    )
)]
pub async fn dashboard_metrics(
    State(state): State<AppState>,
    AdminAccess(subject): AdminAccess,
) -> Result<impl IntoResponse, GatewayError> {
    let ctx = state.request_context();
    let metrics = state.reports.dashboard_metrics(&ctx).await?;
    tracing::debug!(subject = %subject, "dashboard metrics served");
    Ok(Json(metrics))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/dashboard/metrics", get(dashboard_metrics))
}
