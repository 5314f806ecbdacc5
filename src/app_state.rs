//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SessionSettings;
use crate::domain::{ConnectionCounter, RegistryHandle};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the process-wide revision registry.
    pub registry: RegistryHandle,
    /// Live session count, for monitoring only.
    pub connections: ConnectionCounter,
    /// Settings applied to each new session.
    pub settings: Arc<SessionSettings>,
    /// Cancelled on process shutdown; every session derives its own token
    /// from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Builds the state around an already spawned registry.
    #[must_use]
    pub fn new(registry: RegistryHandle, settings: SessionSettings) -> Self {
        Self {
            registry,
            connections: ConnectionCounter::new(),
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }
}
