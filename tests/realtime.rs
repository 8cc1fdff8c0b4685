//! End-to-end broadcast test over a real listener: HTTP submission in,
//! `report.created` frames out to every live WebSocket subscriber.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

use citizen_gateway::api;
use citizen_gateway::app_state::AppState;
use citizen_gateway::config::GatewayConfig;
use citizen_gateway::domain::{ReportStore, UserStore};
use citizen_gateway::observability;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> (SocketAddr, AppState) {
    let Ok(config) = GatewayConfig::from_lookup(|_| None) else {
        panic!("config failed to load");
    };
    let state = AppState::new(
        &config,
        Arc::new(UserStore::new()),
        Arc::new(ReportStore::new()),
        observability::noop(),
        None,
    );
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = api::app(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    (addr, state)
}

async fn next_event<S>(stream: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let Ok(Some(Ok(message))) = timeout(WAIT, stream.next()).await else {
            panic!("no websocket message before timeout");
        };
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("event is not json: {text}");
                };
                return value;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_report_reaches_every_subscriber() {
    let (addr, state) = spawn_server().await;
    let url = format!("ws://{addr}/ws");

    let Ok((mut first, _)) = tokio_tungstenite::connect_async(url.as_str()).await else {
        panic!("first ws connect failed");
    };
    let Ok((mut second, _)) = tokio_tungstenite::connect_async(url.as_str()).await else {
        panic!("second ws connect failed");
    };

    // Registration happens after the upgrade completes on the server side.
    let registered = timeout(WAIT, async {
        while state.hub.client_count() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(registered.is_ok(), "sessions never registered");

    let http = reqwest::Client::new();
    let base = format!("http://{addr}/api/v1");
    let Ok(response) = http
        .post(format!("{base}/auth/register"))
        .json(&json!({ "email": "vecina@example.mx", "password": "contrasena1" }))
        .send()
        .await
    else {
        panic!("register request failed");
    };
    assert_eq!(response.status().as_u16(), 201);
    let Ok(auth) = response.json::<Value>().await else {
        panic!("register body unreadable");
    };
    let Some(token) = auth["token"].as_str() else {
        panic!("no token in {auth}");
    };

    let Ok(response) = http
        .post(format!("{base}/reports"))
        .bearer_auth(token)
        .json(&json!({
            "incidentTypeId": "lighting",
            "description": "Luminaria apagada",
            "latitude": 20.67,
            "longitude": -103.35
        }))
        .send()
        .await
    else {
        panic!("submit request failed");
    };
    assert_eq!(response.status().as_u16(), 201);
    let Ok(report) = response.json::<Value>().await else {
        panic!("report body unreadable");
    };

    let first_event = next_event(&mut first).await;
    let second_event = next_event(&mut second).await;
    assert_eq!(first_event, second_event);
    assert_eq!(first_event["type"], "report.created");
    assert_eq!(first_event["payload"], report);

    state.shutdown(Duration::from_secs(1)).await;
    assert_eq!(state.hub.client_count(), 0);

    // Each subscriber sees the session end.
    for stream in [&mut first, &mut second] {
        let ended = timeout(WAIT, async {
            loop {
                match stream.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(ended.is_ok(), "session was not closed on shutdown");
    }
}
