//! WebSocket layer: subscriber sessions.
//!
//! Each accepted socket runs three cooperating tasks that talk only
//! through channels:
//!
//! ```text
//! socket ──▶ receiver ──Inbound──▶ preparer ──▶ registry
//!              ▲                      │  ▲
//!              └──────Outbound────────┘  └── ticker (Tick)
//! ```
//!
//! The receiver owns the socket and supervises the other two; the
//! preparer owns the [`session::Session`] state; the ticker keeps the
//! change check running when the client is silent.

pub mod handler;
pub mod messages;
pub mod preparer;
pub mod receiver;
pub mod session;
pub mod ticker;
