//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod folios;
pub mod reports;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(catalog::routes())
        .merge(reports::routes())
        .merge(folios::routes())
        .merge(admin::routes())
}
