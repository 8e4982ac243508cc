// List metrics module
//
// Provides lightweight counters for monitoring an upload list over its lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-list metrics
///
/// Uses atomic operations for thread-safe tracking without locks, so notification callbacks
/// can record into it while holding item or list locks. Logged on shutdown or periodically
/// for long-running sessions.
#[derive(Debug)]
pub struct Metrics {
    /// Items accepted by `enqueue`
    pub items_enqueued: AtomicU64,

    /// Success notifications applied
    pub items_succeeded: AtomicU64,

    /// Failure notifications applied, including successes that carried no file id
    pub items_failed: AtomicU64,

    /// In-flight items removed and cancelled
    pub items_dequeued: AtomicU64,

    /// Confirmed items deleted
    pub items_deleted: AtomicU64,

    pub relocations: AtomicU64,

    /// Deletes refused by the minimum file count
    pub deletions_refused: AtomicU64,

    /// Notifications dropped because their subscription was already released
    pub stale_notifications: AtomicU64,

    /// Change events delivered to at least one receiver
    pub events_broadcast: AtomicU64,

    /// Change events sent while nobody was subscribed
    pub broadcast_errors: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            items_enqueued: AtomicU64::new(0),
            items_succeeded: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
            items_dequeued: AtomicU64::new(0),
            items_deleted: AtomicU64::new(0),
            relocations: AtomicU64::new(0),
            deletions_refused: AtomicU64::new(0),
            stale_notifications: AtomicU64::new(0),
            events_broadcast: AtomicU64::new(0),
            broadcast_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_item_enqueued(&self) {
        self.items_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_succeeded(&self) {
        self.items_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_dequeued(&self) {
        self.items_dequeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_deleted(&self) {
        self.items_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relocation(&self) {
        self.relocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletion_refused(&self) {
        self.deletions_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_notification(&self) {
        self.stale_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_broadcast(&self) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast_error(&self) {
        self.broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of finished uploads that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.items_succeeded.load(Ordering::Relaxed);
        let failed = self.items_failed.load(Ordering::Relaxed);
        if succeeded + failed > 0 {
            succeeded as f64 * 100.0 / (succeeded + failed) as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Upload List Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Uploads: {} queued, {} succeeded, {} failed ({:.1}% success)",
            self.items_enqueued.load(Ordering::Relaxed),
            self.items_succeeded.load(Ordering::Relaxed),
            self.items_failed.load(Ordering::Relaxed),
            self.success_rate()
        );
        tracing::info!(
            "Removals: {} dequeued, {} deleted, {} refused; relocations: {}",
            self.items_dequeued.load(Ordering::Relaxed),
            self.items_deleted.load(Ordering::Relaxed),
            self.deletions_refused.load(Ordering::Relaxed),
            self.relocations.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Events broadcast: {}, without receivers: {}, stale notifications: {}",
            self.events_broadcast.load(Ordering::Relaxed),
            self.broadcast_errors.load(Ordering::Relaxed),
            self.stale_notifications.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.items_enqueued.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.stale_notifications.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_item_outcomes() {
        let metrics = Metrics::new();

        metrics.record_item_enqueued();
        metrics.record_item_enqueued();
        metrics.record_item_succeeded();
        metrics.record_item_failed();
        metrics.record_item_dequeued();

        assert_eq!(metrics.items_enqueued.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.items_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.items_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.items_dequeued.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.success_rate(), 50.0);
    }

    #[test]
    fn test_success_rate_without_results() {
        let metrics = Metrics::new();
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }

    #[test]
    fn test_event_counters() {
        let metrics = Metrics::new();

        metrics.record_event_broadcast();
        metrics.record_broadcast_error();
        metrics.record_stale_notification();
        metrics.record_relocation();
        metrics.record_deletion_refused();
        metrics.record_item_deleted();

        assert_eq!(metrics.events_broadcast.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.broadcast_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.stale_notifications.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.relocations.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.deletions_refused.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.items_deleted.load(Ordering::Relaxed), 1);
    }
}
