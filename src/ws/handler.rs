//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;

use super::receiver::run_receiver;
use super::session::Session;
use crate::app_state::AppState;
use crate::domain::SessionId;

/// Upgrades an HTTP connection to a subscriber session.
///
/// Every accepted socket gets a fresh [`Session`] bound to the shared
/// registry; there is no admission control.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session = Session::new(SessionId::new(), peer);
    tracing::debug!(session = %session.id(), %peer, "new connection");

    ws.on_upgrade(move |socket| run_receiver(socket, session, state))
}
