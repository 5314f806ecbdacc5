//! # ccus-gateway
//!
//! Real-time change-notification gateway.
//!
//! Subscribers connect over WebSocket, declare which entities (`uid`s) they
//! track along with the counter they last saw, and receive a push whenever
//! one of those counters advances. The same sockets may publish new
//! counters.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── WS Handler (ws/)          accepts sockets, builds sessions
//!     │     ├── Receiver            owns the socket
//!     │     ├── Preparer            protocol state machine
//!     │     └── Ticker              periodic change check
//!     │
//!     ├── Health endpoint (api/)
//!     ├── Stats reporter (service/)
//!     │
//!     └── Registry actor (domain/)  single owner of uid → counter
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
