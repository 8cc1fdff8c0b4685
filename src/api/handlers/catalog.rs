//! Incident catalog handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::IncidentType;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /catalog/incident-types`: List reportable incident types.
///
/// # Errors
///
/// Returns [`GatewayError`] if the catalog pool misses the deadline.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/incident-types",
    tag = "Catalog",
    summary = "List incident types",
    responses(
        (status = 200, description = "Incident catalog", body = Vec<IncidentType>),
        (status = 504, description = "Deadline exceeded", body = ErrorResponse),
    )
)]
pub async fn incident_types(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let ctx = state.request_context();
    Ok(Json(state.catalog.fetch(&ctx).await?))
}

/// Catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/catalog/incident-types", get(incident_types))
}
