//! Elapsed-time accounting
//!
//! A [`TimingLedger`] accumulates wall-clock time per (tool, execution path)
//! key. Totals only ever grow; they exist for observability and never feed
//! back into search behaviour.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Which backend produced a timing sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExecutionPath {
    /// The external command-line tool
    Subprocess,
    /// The in-process search library
    Embedded,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionPath::Subprocess => write!(f, "subprocess"),
            ExecutionPath::Embedded => write!(f, "embedded"),
        }
    }
}

type TimingKey = (String, ExecutionPath);

/// Shared, monotonically increasing elapsed-time counters
#[derive(Debug, Default)]
pub struct TimingLedger {
    totals: RwLock<HashMap<TimingKey, Arc<AtomicU64>>>,
}

impl TimingLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `elapsed` to the total for `(tool, path)` and return the new total
    pub fn record(&self, tool: &str, path: ExecutionPath, elapsed: Duration) -> Duration {
        let counter = self.counter(tool, path);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let previous = counter.fetch_add(nanos, Ordering::Relaxed);
        Duration::from_nanos(previous.saturating_add(nanos))
    }

    /// Accumulated time for `(tool, path)`; zero if nothing was recorded
    pub fn total(&self, tool: &str, path: ExecutionPath) -> Duration {
        self.totals
            .read()
            .get(&(tool.to_string(), path))
            .map(|counter| Duration::from_nanos(counter.load(Ordering::Relaxed)))
            .unwrap_or_default()
    }

    /// All totals, sorted by key
    pub fn snapshot(&self) -> Vec<(String, ExecutionPath, Duration)> {
        let mut entries: Vec<_> = self
            .totals
            .read()
            .iter()
            .map(|((tool, path), counter)| {
                (tool.clone(), *path, Duration::from_nanos(counter.load(Ordering::Relaxed)))
            })
            .collect();
        entries.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        entries
    }

    fn counter(&self, tool: &str, path: ExecutionPath) -> Arc<AtomicU64> {
        let key = (tool.to_string(), path);
        if let Some(counter) = self.totals.read().get(&key) {
            return Arc::clone(counter);
        }

        let mut totals = self.totals.write();
        Arc::clone(totals.entry(key).or_default())
    }
}

/// Wall-clock stopwatch that reports into a [`TimingLedger`]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Stop, record into `ledger`, and log the sample with the running total
    pub fn stop(self, ledger: &TimingLedger, tool: &str, path: ExecutionPath) -> Duration {
        let elapsed = self.started.elapsed();
        let total = ledger.record(tool, path, elapsed);
        log::info!(
            "{} {} took {:.3}s (total {:.3}s)",
            tool,
            path,
            elapsed.as_secs_f64(),
            total.as_secs_f64()
        );
        elapsed
    }
}
