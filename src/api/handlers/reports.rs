//! Report handlers: list, submit, get, status update, delete.
//!
//! All routes require a bearer token. Submissions also pass the report
//! rate gate and are pushed to live subscribers once stored.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ReportListParams, StatusUpdateRequest, validate_submission};
use crate::api::extract::{AuthSubject, ClientKey};
use crate::app_state::AppState;
use crate::domain::{NewReport, Report, ReportPage};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /reports`: Paginated report list, newest first.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown status filter or a missing token.
#[utoipa::path(
    get,
    path = "/api/v1/reports",
    tag = "Reports",
    summary = "List reports",
    security(("bearer" = [])),
    params(ReportListParams),
    responses(
        (status = 200, description = "One page of reports", body = ReportPage),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn list_reports(
    State(state): State<AppState>,
    _subject: AuthSubject,
    Query(params): Query<ReportListParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let params = params.clamped();
    let ctx = state.request_context();
    let page = state
        .reports
        .list(&ctx, params.page, params.page_size, params.status.as_deref())
        .await?;
    Ok(Json(page))
}

/// `POST /reports`: File a new report and broadcast it.
///
/// A full broadcast queue is logged; the report is still created.
///
/// # Errors
///
/// Returns [`GatewayError`] on rate denial, invalid input, or a missed
/// deadline.
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    tag = "Reports",
    summary = "Submit a report",
    security(("bearer" = [])),
    request_body = NewReport,
    responses(
        (status = 201, description = "Report filed", body = Report),
        (status = 400, description = "Invalid report", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 504, description = "Deadline exceeded", body = ErrorResponse),
    )
)]
pub async fn create_report(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    key: ClientKey,
    Json(req): Json<NewReport>,
) -> Result<impl IntoResponse, GatewayError> {
    key.admit(&state.report_gate)?;
    validate_submission(&req)?;
    let ctx = state.request_context();
    let report = state.reports.submit(&ctx, req).await?;
    tracing::info!(folio = %report.id, subject = %subject, "report filed");

    if let Err(err) = state.hub.broadcast_report(&report) {
        tracing::warn!(folio = %report.id, error = %err, "report broadcast dropped");
    }
    Ok((StatusCode::CREATED, Json(report)))
}

/// `GET /reports/{id}`: Fetch one report.
///
/// # Errors
///
/// Returns [`GatewayError`] if the report does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    summary = "Get a report",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Report folio")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
    )
)]
pub async fn get_report(
    State(state): State<AppState>,
    _subject: AuthSubject,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let ctx = state.request_context();
    Ok(Json(state.reports.get(&ctx, &id).await?))
}

/// `PATCH /reports/{id}`: Move a report to a new status.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown status or report.
#[utoipa::path(
    patch,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    summary = "Update report status",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Report folio")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated report", body = Report),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
    )
)]
pub async fn update_report(
    State(state): State<AppState>,
    _subject: AuthSubject,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let status = req.validate()?;
    let ctx = state.request_context();
    Ok(Json(
        state.reports.update_status(&ctx, &id, status.as_str()).await?,
    ))
}

/// `DELETE /reports/{id}`: Remove a report.
///
/// # Errors
///
/// Returns [`GatewayError`] if the report does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    summary = "Delete a report",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Report folio")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
    )
)]
pub async fn delete_report(
    State(state): State<AppState>,
    _subject: AuthSubject,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let ctx = state.request_context();
    state.reports.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route(
            "/reports/{id}",
            get(get_report).patch(update_report).delete(delete_report),
        )
}
