//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::transport::WsTransport;
use crate::app_state::AppState;

/// Largest inbound frame accepted from a subscriber.
pub const MAX_INBOUND_MESSAGE: usize = 1024;

/// `GET /ws`: Upgrade to a WebSocket and stream `report.created` events.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    let ctx = state.root_ctx.child();
    ws.max_message_size(MAX_INBOUND_MESSAGE)
        .on_upgrade(move |socket| async move {
            let client = hub.register(Arc::new(WsTransport::new(socket)));
            tracing::debug!(client_id = client.id(), "ws subscriber connected");
            client.run(ctx).await;
        })
}
