//! HTTP surface next to the socket endpoint.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router with every plain HTTP endpoint.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(handlers::system::routes())
}
