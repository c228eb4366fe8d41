//! Run statistics for searches and resolution

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Default)]
struct Counters {
    pages: AtomicU64,
    total_pages: AtomicU64,
    certificates: AtomicU64,
    hosts_submitted: AtomicU64,
    results: AtomicU64,
    origin_bypasses: AtomicU64,
    internal_hosts: AtomicU64,
    lines_skipped: AtomicU64,
}

/// Thread-safe statistics collector; clones share the same counters
#[derive(Clone)]
pub struct StatsCollector {
    counters: Arc<Counters>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub pages: u64,
    /// Pages the search is expected to return, 0 until the first page arrives
    pub total_pages: u64,
    pub certificates: u64,
    pub hosts_submitted: u64,
    pub results: u64,
    pub origin_bypasses: u64,
    pub internal_hosts: u64,
    pub lines_skipped: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Hosts that were submitted but produced no result (empty answers)
    pub fn hosts_dropped(&self) -> u64 {
        self.hosts_submitted.saturating_sub(self.results)
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    pub fn increment_pages(&self) {
        self.counters.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_total_pages(&self, total: u64) {
        self.counters.total_pages.store(total, Ordering::Relaxed);
    }

    pub fn add_certificates(&self, count: u64) {
        self.counters.certificates.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_hosts_submitted(&self) {
        self.counters.hosts_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_results(&self) {
        self.counters.results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_origin_bypasses(&self) {
        self.counters.origin_bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_hosts(&self) {
        self.counters.internal_hosts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lines_skipped(&self) {
        self.counters.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.counters;
        StatsSnapshot {
            pages: c.pages.load(Ordering::Relaxed),
            total_pages: c.total_pages.load(Ordering::Relaxed),
            certificates: c.certificates.load(Ordering::Relaxed),
            hosts_submitted: c.hosts_submitted.load(Ordering::Relaxed),
            results: c.results.load(Ordering::Relaxed),
            origin_bypasses: c.origin_bypasses.load(Ordering::Relaxed),
            internal_hosts: c.internal_hosts.load(Ordering::Relaxed),
            lines_skipped: c.lines_skipped.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// One-line summary used by the progress spinner
    pub fn format_stats(&self) -> String {
        let s = self.snapshot();
        format!(
            "{} pages | {} certs | {}/{} hosts resolved | {} bypass | {} internal | {}",
            Self::format_pages(s.pages, s.total_pages),
            s.certificates,
            s.results,
            s.hosts_submitted,
            s.origin_bypasses,
            s.internal_hosts,
            Self::format_uptime(s.uptime_secs)
        )
    }

    /// `page/total` once the total is known
    pub fn format_pages(pages: u64, total_pages: u64) -> String {
        if total_pages > 0 {
            format!("{}/{}", pages, total_pages)
        } else {
            pages.to_string()
        }
    }

    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
