//! Process-wide count of live subscriber sessions.
//!
//! The count is a monitoring side effect only; nothing in the protocol
//! depends on it. It is surfaced through `GET /health` and the periodic
//! statistics reporter, and mirrored to the `ws_connections_active` gauge
//! of whatever `metrics` recorder is installed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};

/// Cloneable handle to the shared connection count.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    active: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one live connection until the returned guard is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        counter!("ws_connections_total").increment(1);
        gauge!("ws_connections_active").increment(1.0);
        ConnectionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Returns the number of connections currently alive.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Decrements the owning [`ConnectionCounter`] on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        counter!("ws_disconnections_total").increment(1);
        gauge!("ws_connections_active").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };

    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ConnectionCounter::new().active(), 0);
    }

    #[test]
    fn guard_tracks_lifetime() {
        let counter = ConnectionCounter::new();
        let first = counter.acquire();
        let second = counter.clone().acquire();
        assert_eq!(counter.active(), 2);

        drop(first);
        assert_eq!(counter.active(), 1);
        drop(second);
        assert_eq!(counter.active(), 0);
    }

    /// Records only the `ws_connections_active` gauge.
    #[derive(Debug, Default)]
    struct GaugeRecorder {
        active: Arc<AtomicU64>,
    }

    impl GaugeRecorder {
        fn value(&self) -> f64 {
            f64::from_bits(self.active.load(Ordering::Acquire))
        }
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == "ws_connections_active" {
                Gauge::from_arc(Arc::clone(&self.active))
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn guard_drives_active_gauge() {
        let recorder = GaugeRecorder::default();
        let counter = ConnectionCounter::new();

        let guard = metrics::with_local_recorder(&recorder, || counter.acquire());
        assert!((recorder.value() - 1.0).abs() < f64::EPSILON);

        metrics::with_local_recorder(&recorder, || drop(guard));
        assert!(recorder.value().abs() < f64::EPSILON);
        assert_eq!(counter.active(), 0);
    }
}
