//! Periodic progress reporting for long bulk loads.

use std::time::{Duration, Instant};
use tracing::info;

/// Emits at most one progress line per `every` rows, and never more than one
/// per 200 ms.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    start: Instant,
    last: Instant,
    every: u64,
}

impl Tick {
    const MIN_INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(every: u64) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            every: every.max(1),
        }
    }

    pub fn observe(&mut self, table: &str, count: u64) {
        if count % self.every != 0 || self.last.elapsed() < Self::MIN_INTERVAL {
            return;
        }
        let elapsed = self.start.elapsed().as_secs_f64().max(1e-9);
        info!(
            table,
            rows = count,
            rate_per_s = format!("{:.0}", count as f64 / elapsed),
            "bulk load progress"
        );
        self.last = Instant::now();
    }
}
