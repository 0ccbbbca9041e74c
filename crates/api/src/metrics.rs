use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    cache_hits: AtomicUsize,
    batches_run: AtomicUsize,

    // Timing (in microseconds)
    total_reconcile_time_us: AtomicU64,

    // Counts
    patents_reconciled: AtomicUsize,
    patents_failed: AtomicUsize,
    conflicts_logged: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            batches_run: AtomicUsize::new(0),
            total_reconcile_time_us: AtomicU64::new(0),
            patents_reconciled: AtomicUsize::new(0),
            patents_failed: AtomicUsize::new(0),
            conflicts_logged: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, duration: std::time::Duration, reconciled: usize, failed: usize, conflicts: usize) {
        self.batches_run.fetch_add(1, Ordering::Relaxed);
        self.total_reconcile_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.patents_reconciled.fetch_add(reconciled, Ordering::Relaxed);
        self.patents_failed.fetch_add(failed, Ordering::Relaxed);
        self.conflicts_logged.fetch_add(conflicts, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches_run = self.batches_run.load(Ordering::Relaxed);
        let batches = batches_run as f64;
        let total_us = self.total_reconcile_time_us.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            batches_run,
            avg_reconcile_time_ms: if batches > 0.0 {
                total_us / batches / 1000.0 // Convert to ms
            } else {
                0.0
            },
            patents_reconciled: self.patents_reconciled.load(Ordering::Relaxed),
            patents_failed: self.patents_failed.load(Ordering::Relaxed),
            conflicts_logged: self.conflicts_logged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub cache_hits: usize,
    pub batches_run: usize,
    pub avg_reconcile_time_ms: f64,
    pub patents_reconciled: usize,
    pub patents_failed: usize,
    pub conflicts_logged: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
