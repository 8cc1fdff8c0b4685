//! Public folio tracking.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::FolioStatus;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /folios/{folio}`: Track a report by folio without signing in.
///
/// # Errors
///
/// Returns [`GatewayError`] for a blank or unknown folio.
#[utoipa::path(
    get,
    path = "/api/v1/folios/{folio}",
    tag = "Reports",
    summary = "Track a folio",
    params(("folio" = String, Path, description = "Folio, e.g. F-10422")),
    responses(
        (status = 200, description = "Folio status", body = FolioStatus),
        (status = 400, description = "Missing folio", body = ErrorResponse),
        (status = 404, description = "Unknown folio", body = ErrorResponse),
    )
)]
pub async fn lookup(
    State(state): State<AppState>,
    Path(folio): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let folio = folio.trim();
    if folio.is_empty() {
        return Err(GatewayError::InvalidRequest("missing folio id".to_string()));
    }
    let ctx = state.request_context();
    Ok(Json(state.reports.lookup(&ctx, folio).await?))
}

/// Folio routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/folios/{folio}", get(lookup))
}
