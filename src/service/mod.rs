//! Service layer: background jobs that run next to the sessions.

pub mod stats;

pub use stats::run_stats_reporter;
