//! Domain layer: revision registry, session identity and connection count.
//!
//! This module contains the process-wide shared state. The
//! [`Registry`] is the single source of truth for every `uid` counter and
//! is only reachable through a [`RegistryHandle`]; the
//! [`ConnectionCounter`] tracks live sessions for monitoring.

pub mod connection_counter;
pub mod registry;
pub mod session_id;

pub use connection_counter::{ConnectionCounter, ConnectionGuard};
pub use registry::{Registry, RegistryHandle, RegistryOp, RegistryReply, RegistryStats};
pub use session_id::SessionId;
