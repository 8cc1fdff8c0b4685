//! Authentication handlers: login, registration, recovery, social login.
//!
//! Every route here passes through the auth rate gate first.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CredentialsRequest, RecoverRequest};
use crate::api::extract::ClientKey;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::AuthResponse;

/// `POST /auth/login`: Exchange credentials for a bearer token.
///
/// # Errors
///
/// Returns [`GatewayError`] on rate denial, invalid input, bad credentials,
/// or a missed deadline.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    summary = "Log in",
    description = "Checks the email and password on the credential pool and issues a bearer token.",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Token issued", body = AuthResponse),
        (status = 400, description = "Malformed email or short password", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 504, description = "Deadline exceeded", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    key: ClientKey,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    key.admit(&state.auth_gate)?;
    req.validate()?;
    let ctx = state.request_context();
    let response = state.auth.authenticate(&ctx, &req.email, &req.password).await?;
    Ok(Json(response))
}

/// `POST /auth/register`: Create an account and sign it in.
///
/// # Errors
///
/// Returns [`GatewayError`] on rate denial, invalid input, or an email
/// that is already registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    summary = "Register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Malformed email or short password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    key: ClientKey,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    key.admit(&state.auth_gate)?;
    req.validate()?;
    let ctx = state.request_context();
    let response = state.auth.register(&ctx, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /auth/recover`: Start password recovery.
///
/// # Errors
///
/// Returns [`GatewayError`] on rate denial, a malformed email, or an
/// unknown account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/recover",
    tag = "Auth",
    summary = "Recover password",
    request_body = RecoverRequest,
    responses(
        (status = 202, description = "Recovery accepted"),
        (status = 400, description = "Malformed email", body = ErrorResponse),
        (status = 401, description = "Unknown account", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn recover(
    State(state): State<AppState>,
    key: ClientKey,
    Json(req): Json<RecoverRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    key.admit(&state.auth_gate)?;
    req.validate()?;
    let ctx = state.request_context();
    state.auth.recover(&ctx, &req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /auth/social/{provider}`: Federated login.
///
/// # Errors
///
/// Returns [`GatewayError`] on rate denial or an unsupported provider.
#[utoipa::path(
    post,
    path = "/api/v1/auth/social/{provider}",
    tag = "Auth",
    summary = "Social login",
    params(("provider" = String, Path, description = "google, apple, or facebook")),
    responses(
        (status = 200, description = "Token issued", body = AuthResponse),
        (status = 400, description = "Unsupported provider", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn social(
    State(state): State<AppState>,
    key: ClientKey,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    key.admit(&state.auth_gate)?;
    let ctx = state.request_context();
    let response = state.auth.social_authenticate(&ctx, &provider)?;
    Ok(Json(response))
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/recover", post(recover))
        .route("/auth/social/{provider}", post(social))
}
