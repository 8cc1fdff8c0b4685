//! Router-level tests driving the REST surface with `tower::ServiceExt::oneshot`.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use citizen_gateway::api;
use citizen_gateway::app_state::AppState;
use citizen_gateway::config::GatewayConfig;
use citizen_gateway::domain::{ReportStore, UserStore};
use citizen_gateway::observability;

fn state_with(vars: &[(&str, &str)]) -> AppState {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let Ok(config) = GatewayConfig::from_lookup(|key| vars.get(key).cloned()) else {
        panic!("config failed to load");
    };
    AppState::new(
        &config,
        Arc::new(UserStore::new()),
        Arc::new(ReportStore::new()),
        observability::noop(),
        None,
    )
}

struct Call<'a> {
    method: &'a str,
    uri: &'a str,
    token: Option<&'a str>,
    body: Option<Value>,
    headers: &'a [(&'a str, &'a str)],
}

impl<'a> Call<'a> {
    fn get(uri: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            token: None,
            body: None,
            headers: &[],
        }
    }

    fn post(uri: &'a str, body: Value) -> Self {
        Self {
            method: "POST",
            body: Some(body),
            ..Self::get(uri)
        }
    }

    fn bearer(self, token: &'a str) -> Self {
        Self {
            token: Some(token),
            ..self
        }
    }
}

async fn send(app: &Router, call: Call<'_>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(call.method).uri(call.uri);
    if let Some(token) = call.token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    for (name, value) in call.headers {
        builder = builder.header(*name, *value);
    }
    let body = match call.body {
        Some(body) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("invalid request");
    };
    let response = match app.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("unreadable body");
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Call::post(
            "/api/v1/auth/register",
            json!({ "email": email, "password": "contrasena1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let Some(token) = body["token"].as_str() else {
        panic!("register returned no token: {body}");
    };
    token.to_string()
}

fn pothole() -> Value {
    json!({
        "incidentTypeId": "pothole",
        "description": "Bache frente a la escuela",
        "latitude": 19.4326,
        "longitude": -99.1332
    })
}

#[tokio::test]
async fn report_lifecycle_through_the_api() {
    let state = state_with(&[]);
    let app = api::app(state.clone());
    let token = register(&app, "Vecina@Example.mx").await;

    let (status, body) = send(
        &app,
        Call::post(
            "/api/v1/auth/login",
            json!({ "email": "vecina@example.mx", "password": "contrasena1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["expiresAt"].is_string());

    let (status, body) = send(&app, Call::get("/api/v1/catalog/incident-types")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, _) = send(&app, Call::post("/api/v1/reports", pothole())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = send(&app, Call::post("/api/v1/reports", pothole()).bearer(&token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "en_revision");
    assert_eq!(created["incidentType"]["id"], "pothole");
    let Some(folio) = created["id"].as_str() else {
        panic!("report has no id: {created}");
    };
    assert!(folio.starts_with("F-"));

    let (status, page) = send(&app, Call::get("/api/v1/reports").bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 1);
    assert_eq!(page["hasMore"], false);
    assert_eq!(page["items"][0]["id"], folio);

    let uri = format!("/api/v1/reports/{folio}");
    let (status, fetched) = send(&app, Call::get(&uri).bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &app,
        Call {
            method: "PATCH",
            body: Some(json!({ "status": "resuelto" })),
            ..Call::get(&uri).bearer(&token)
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "resuelto");

    let folio_uri = format!("/api/v1/folios/{folio}");
    let (status, tracking) = send(&app, Call::get(&folio_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["status"], "resuelto");
    assert_eq!(tracking["history"].as_array().map(Vec::len), Some(3));

    let (status, metrics) = send(
        &app,
        Call::get("/api/v1/admin/dashboard/metrics").bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["resolvedReports"], 1);
    assert_eq!(metrics["pendingReports"], 0);

    let (status, _) = send(
        &app,
        Call {
            method: "DELETE",
            ..Call::get(&uri).bearer(&token)
        },
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Call::get(&uri).bearer(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2003);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn auth_gate_limits_each_client_separately() {
    let state = state_with(&[]);
    let app = api::app(state.clone());
    let login = || json!({ "email": "nadie@example.mx", "password": "incorrecta" });
    let from = |ip: &'static str| -> &'static [(&'static str, &'static str)] {
        match ip {
            "a" => &[("x-forwarded-for", "198.51.100.1, 10.0.0.1")],
            _ => &[("x-forwarded-for", "198.51.100.2")],
        }
    };

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            Call {
                headers: from("a"),
                ..Call::post("/api/v1/auth/login", login())
            },
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = send(
        &app,
        Call {
            headers: from("a"),
            ..Call::post("/api/v1/auth/login", login())
        },
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], 429);

    let (status, _) = send(
        &app,
        Call {
            headers: from("b"),
            ..Call::post("/api/v1/auth/login", login())
        },
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn invalid_input_is_rejected_before_services() {
    let state = state_with(&[]);
    let app = api::app(state.clone());
    let token = register(&app, "admin@example.mx").await;

    let (status, _) = send(
        &app,
        Call::post(
            "/api/v1/auth/register",
            json!({ "email": "otra@example.mx", "password": "corta" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Call::post(
            "/api/v1/auth/register",
            json!({ "email": "admin@example.mx", "password": "contrasena1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Call::post("/api/v1/auth/social/myspace", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Call::post("/api/v1/auth/social/google", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, _) = send(
        &app,
        Call::get("/api/v1/reports?status=archivado").bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Call::post(
            "/api/v1/reports",
            json!({ "incidentTypeId": "pothole", "description": "x", "latitude": 91.0, "longitude": 0.0 }),
        )
        .bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Call::get("/api/v1/folios/F-00000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Call {
            headers: &[("authorization", "Basic abc")],
            ..Call::get("/api/v1/reports")
        },
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_accepted() {
    let state = state_with(&[]);
    let app = api::app(state.clone());
    let token = register(&app, "vecino@example.mx").await;
    let header = format!("bearer {token}");

    let (status, page) = send(
        &app,
        Call {
            headers: &[("authorization", header.as_str())],
            ..Call::get("/api/v1/reports")
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 0);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn admin_dashboard_requires_configured_key() {
    let state = state_with(&[("ADMIN_METRICS_API_KEY", "clave-admin")]);
    let app = api::app(state.clone());
    let token = register(&app, "admin@example.mx").await;

    let (status, body) = send(
        &app,
        Call::get("/api/v1/admin/dashboard/metrics").bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], 2005);

    let (status, body) = send(
        &app,
        Call {
            headers: &[("x-admin-api-key", "clave-admin")],
            ..Call::get("/api/v1/admin/dashboard/metrics").bearer(&token)
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pendingReports"], 0);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn oversized_timeout_and_windows_still_serve_requests() {
    let forever = "18446744073709551615";
    let state = state_with(&[
        ("REQUEST_TIMEOUT_SECS", forever),
        ("RATE_LIMIT_AUTH_WINDOW_SECS", forever),
        ("RATE_LIMIT_REPORT_WINDOW_SECS", forever),
    ]);
    let app = api::app(state.clone());
    let token = register(&app, "paciente@example.mx").await;

    let (status, created) = send(&app, Call::post("/api/v1/reports", pothole()).bearer(&token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["id"].is_string());

    let (status, _) = send(
        &app,
        Call::post(
            "/api/v1/auth/login",
            json!({ "email": "paciente@example.mx", "password": "contrasena1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    state.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn system_routes_report_health_and_disabled_metrics() {
    let state = state_with(&[]);
    let app = api::app(state.clone());

    let (status, body) = send(&app, Call::get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ws_sessions"], 0);

    let (status, _) = send(&app, Call::get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    state.shutdown(Duration::from_millis(200)).await;

    let (status, body) = send(&app, Call::get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "draining");
}
