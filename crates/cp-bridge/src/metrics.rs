use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetricsSnapshot {
    pub probes_sent: u64,
    pub probes_failed: u64,
    pub messages_delivered: u64,
    pub delivery_attempts_failed: u64,
    pub deliveries_exhausted: u64,
    /// Successful deliveries that landed on a candidate other than the
    /// cached one.
    pub failovers: u64,
    pub last_error: Option<String>,
}

/// Counters updated by the secure channel. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    probes_sent: AtomicU64,
    probes_failed: AtomicU64,
    messages_delivered: AtomicU64,
    delivery_attempts_failed: AtomicU64,
    deliveries_exhausted: AtomicU64,
    failovers: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn probe_sent(&self) {
        self.probes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn probe_failed(&self, reason: &str) {
        self.probes_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(reason);
    }

    pub(crate) fn delivered(&self, failover: bool) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        if failover {
            self.failovers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn attempt_failed(&self, reason: &str) {
        self.delivery_attempts_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(reason);
    }

    pub(crate) fn exhausted(&self) {
        self.deliveries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    fn set_last_error(&self, reason: &str) {
        let mut last = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(reason.to_string());
    }

    pub fn snapshot(&self) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            probes_sent: self.probes_sent.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            delivery_attempts_failed: self.delivery_attempts_failed.load(Ordering::Relaxed),
            deliveries_exhausted: self.deliveries_exhausted.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_zeroed() {
        let m = ChannelMetrics::new().snapshot();
        assert_eq!(m, ChannelMetricsSnapshot::default());
        assert!(m.last_error.is_none());
    }

    #[test]
    fn counters_accumulate() {
        let m = ChannelMetrics::new();
        m.probe_sent();
        m.probe_sent();
        m.probe_failed("timeout after 3000ms");
        m.delivered(false);
        m.delivered(true);
        m.attempt_failed("runtime error: gone");
        m.exhausted();

        let s = m.snapshot();
        assert_eq!(s.probes_sent, 2);
        assert_eq!(s.probes_failed, 1);
        assert_eq!(s.messages_delivered, 2);
        assert_eq!(s.failovers, 1);
        assert_eq!(s.delivery_attempts_failed, 1);
        assert_eq!(s.deliveries_exhausted, 1);
        assert_eq!(s.last_error.as_deref(), Some("runtime error: gone"));
    }
}
