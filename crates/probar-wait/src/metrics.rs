//! Wait Metrics
//!
//! Outcome telemetry for every wait executed against one session.
//!
//! ## Layout
//!
//! - Running totals and per-condition buckets are atomic counters. They are
//!   never decremented except by [`WaitMetrics::clear`].
//! - Individual [`WaitRecord`]s go into a bounded FIFO behind a mutex. The
//!   FIFO is a recent-window sample; evicting from it never touches the totals.
//!
//! All operations take `&self` and are safe under any number of concurrent
//! callers.

use crate::result::ProbarResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of detailed records kept per session
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

fn average(total_nanos: u64, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(total_nanos / count)
}

// =============================================================================
// WAIT RECORD
// =============================================================================

/// Immutable record of one completed wait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitRecord {
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
    /// Condition description (metric bucket name)
    pub condition: String,
    /// Time spent waiting
    pub duration: Duration,
    /// Whether the condition was satisfied
    pub successful: bool,
    /// Failure detail, `None` for successes
    pub error_message: Option<String>,
    /// Worker thread that executed the wait
    pub thread: String,
}

impl WaitRecord {
    /// Create a success record stamped with the current time and thread
    #[must_use]
    pub fn success(condition: impl Into<String>, duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            condition: condition.into(),
            duration,
            successful: true,
            error_message: None,
            thread: current_thread_name(),
        }
    }

    /// Create a failure record stamped with the current time and thread
    #[must_use]
    pub fn failure(
        condition: impl Into<String>,
        duration: Duration,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            condition: condition.into(),
            duration,
            successful: false,
            error_message: Some(error_message.into()),
            thread: current_thread_name(),
        }
    }
}

impl fmt::Display for WaitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WaitRecord{{{}, {}, {}ms, {}, thread={}}}",
            self.timestamp.to_rfc3339(),
            self.condition,
            self.duration.as_millis(),
            if self.successful { "SUCCESS" } else { "FAILED" },
            self.thread
        )
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    thread
        .name()
        .map_or_else(|| format!("{:?}", thread.id()), str::to_string)
}

// =============================================================================
// CONDITION STATS
// =============================================================================

#[derive(Debug, Default)]
struct ConditionCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
}

/// Point-in-time aggregate for one condition name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionStats {
    /// Satisfied waits
    pub successes: u64,
    /// Timed-out or errored waits
    pub failures: u64,
    /// Total time spent in waits for this condition
    pub total_time: Duration,
}

impl ConditionStats {
    /// Total waits for this condition
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.successes + self.failures
    }

    /// Success rate in percent, `0.0` when there is no data
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        percentage(self.successes, self.attempts())
    }

    /// Average time per wait, zero when there is no data
    #[must_use]
    pub fn average_wait_time(&self) -> Duration {
        average(duration_nanos(self.total_time), self.attempts())
    }
}

impl From<&ConditionCounters> for ConditionStats {
    fn from(counters: &ConditionCounters) -> Self {
        Self {
            successes: counters.successes.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            total_time: Duration::from_nanos(counters.total_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Serializable view of a whole metrics store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Waits recorded
    pub total_attempted: u64,
    /// Waits that succeeded
    pub total_successful: u64,
    /// Waits that failed
    pub total_failed: u64,
    /// Overall success rate in percent
    pub success_rate: f64,
    /// Overall average wait time
    pub average_wait_time: Duration,
    /// Per-condition aggregates, ordered by name
    pub conditions: BTreeMap<String, ConditionStats>,
    /// Detailed records, oldest first
    pub history: Vec<WaitRecord>,
}

// =============================================================================
// WAIT METRICS
// =============================================================================

/// Thread-safe accumulator of wait outcomes for one session
#[derive(Debug)]
pub struct WaitMetrics {
    attempted: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    total_nanos: AtomicU64,
    by_condition: DashMap<String, ConditionCounters>,
    history: Mutex<VecDeque<WaitRecord>>,
    capacity: usize,
    detailed: bool,
}

impl Default for WaitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitMetrics {
    /// Create a store keeping the last [`DEFAULT_HISTORY_CAPACITY`] records
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY_CAPACITY, true)
    }

    /// Create a store with a custom history bound.
    ///
    /// With `detailed` off, only aggregates are kept and the history views
    /// are always empty.
    #[must_use]
    pub fn with_history(capacity: usize, detailed: bool) -> Self {
        debug!(capacity, detailed, "wait metrics initialized");
        Self {
            attempted: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            by_condition: DashMap::new(),
            history: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY))),
            capacity,
            detailed,
        }
    }

    /// History capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether detailed records are kept
    #[must_use]
    pub const fn is_detailed(&self) -> bool {
        self.detailed
    }

    /// Record a satisfied wait
    pub fn record_success(&self, condition: &str, duration: Duration) {
        let nanos = duration_nanos(duration);
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.with_bucket(condition, |bucket| {
            bucket.successes.fetch_add(1, Ordering::Relaxed);
            bucket.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        });

        if self.detailed {
            self.push_record(WaitRecord::success(condition, duration));
        }

        debug!(
            condition,
            elapsed_ms = duration.as_millis() as u64,
            "recorded successful wait"
        );
    }

    /// Record a timed-out or errored wait
    pub fn record_failure(&self, condition: &str, duration: Duration, message: &str) {
        let nanos = duration_nanos(duration);
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.with_bucket(condition, |bucket| {
            bucket.failures.fetch_add(1, Ordering::Relaxed);
            bucket.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        });

        if self.detailed {
            self.push_record(WaitRecord::failure(condition, duration, message));
        }

        warn!(
            condition,
            elapsed_ms = duration.as_millis() as u64,
            error = message,
            "recorded failed wait"
        );
    }

    fn with_bucket(&self, condition: &str, update: impl FnOnce(&ConditionCounters)) {
        if let Some(bucket) = self.by_condition.get(condition) {
            update(bucket.value());
            return;
        }
        let bucket = self
            .by_condition
            .entry(condition.to_string())
            .or_default();
        update(bucket.value());
    }

    fn push_record(&self, record: WaitRecord) {
        let mut history = self.history.lock();
        history.push_back(record);
        let mut evicted = 0usize;
        while history.len() > self.capacity {
            history.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::trace!(evicted, capacity = self.capacity, "evicted old wait records");
        }
    }

    /// Waits recorded since creation or the last clear
    #[must_use]
    pub fn total_attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Successful waits
    #[must_use]
    pub fn total_successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    /// Failed waits
    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Overall success rate in percent, `0.0` with no data.
    ///
    /// Derived from the success and failure counters only, so a concurrent
    /// [`clear`](Self::clear) can never push it above 100.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let successful = self.total_successful();
        let failed = self.total_failed();
        percentage(successful, successful.saturating_add(failed))
    }

    /// Success rate for one condition, `0.0` when unknown
    #[must_use]
    pub fn success_rate_for(&self, condition: &str) -> f64 {
        self.stats_for(condition).success_rate()
    }

    /// Overall average wait time, zero with no data
    #[must_use]
    pub fn average_wait_time(&self) -> Duration {
        average(
            self.total_nanos.load(Ordering::Relaxed),
            self.total_attempted(),
        )
    }

    /// Average wait time for one condition, zero when unknown
    #[must_use]
    pub fn average_wait_time_for(&self, condition: &str) -> Duration {
        self.stats_for(condition).average_wait_time()
    }

    /// Aggregate for one condition; all zeros when unknown
    #[must_use]
    pub fn stats_for(&self, condition: &str) -> ConditionStats {
        self.by_condition
            .get(condition)
            .map(|bucket| ConditionStats::from(&*bucket))
            .unwrap_or_default()
    }

    /// All condition names with data, sorted
    #[must_use]
    pub fn condition_names(&self) -> Vec<String> {
        self.condition_stats().into_keys().collect()
    }

    fn condition_stats(&self) -> BTreeMap<String, ConditionStats> {
        self.by_condition
            .iter()
            .map(|entry| (entry.key().clone(), ConditionStats::from(entry.value())))
            .collect()
    }

    /// Detailed records, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<WaitRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Up to `limit` slowest records, slowest first
    #[must_use]
    pub fn slowest(&self, limit: usize) -> Vec<WaitRecord> {
        if !self.detailed {
            warn!("cannot provide slowest waits, detailed records are disabled");
            return Vec::new();
        }
        let mut records = self.history();
        records.sort_by(|a, b| b.duration.cmp(&a.duration));
        records.truncate(limit);
        records
    }

    /// Up to `limit` most recent failures, newest first
    #[must_use]
    pub fn recent_failures(&self, limit: usize) -> Vec<WaitRecord> {
        if !self.detailed {
            warn!("cannot provide recent failed waits, detailed records are disabled");
            return Vec::new();
        }
        // Newest-first insertion order breaks timestamp ties.
        let mut failures: Vec<WaitRecord> = self
            .history
            .lock()
            .iter()
            .rev()
            .filter(|record| !record.successful)
            .cloned()
            .collect();
        failures.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        failures.truncate(limit);
        failures
    }

    /// Render all aggregates as a stable, human-readable report
    #[must_use]
    pub fn summary_report(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "=== Wait Metrics Summary ===");
        let _ = writeln!(report, "Total waits attempted: {}", self.total_attempted());
        let _ = writeln!(report, "Successful waits: {}", self.total_successful());
        let _ = writeln!(report, "Failed waits: {}", self.total_failed());
        let _ = writeln!(report, "Overall success rate: {:.2}%", self.success_rate());
        let _ = writeln!(
            report,
            "Average wait time: {}ms",
            self.average_wait_time().as_millis()
        );

        let conditions = self.condition_stats();
        if !conditions.is_empty() {
            let _ = writeln!(report);
            let _ = writeln!(report, "=== By Condition Type ===");
            for (name, stats) in &conditions {
                let _ = writeln!(
                    report,
                    "{}: {} successful, {} failed ({:.1}% success, {}ms avg)",
                    name,
                    stats.successes,
                    stats.failures,
                    stats.success_rate(),
                    stats.average_wait_time().as_millis()
                );
            }
        }

        report
    }

    /// Capture aggregates and history
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_attempted: self.total_attempted(),
            total_successful: self.total_successful(),
            total_failed: self.total_failed(),
            success_rate: self.success_rate(),
            average_wait_time: self.average_wait_time(),
            conditions: self.condition_stats(),
            history: self.history(),
        }
    }

    /// Export a snapshot as pretty JSON
    pub fn to_json(&self) -> ProbarResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Reset all counters and history.
    ///
    /// Waits still in flight report into the post-clear state.
    pub fn clear(&self) {
        self.attempted.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
        self.by_condition.clear();
        self.history.lock().clear();
        debug!("all wait metrics cleared");
    }
}
