//! Router assembly and serving.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::ws::handler::ws_handler;

/// Builds the full application router: the subscriber socket at `ws_path`
/// plus the plain HTTP endpoints.
pub fn build_app(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .merge(api::build_router())
        .route(ws_path, get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serves `app` on `listener` until `state.shutdown` is cancelled.
///
/// Peer addresses are made available to handlers through `ConnectInfo`.
///
/// # Errors
///
/// Returns [`GatewayError::Io`] if the server fails.
pub async fn serve(listener: TcpListener, state: AppState, ws_path: &str) -> Result<(), GatewayError> {
    let shutdown = state.shutdown.clone();
    let app = build_app(state, ws_path);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}
