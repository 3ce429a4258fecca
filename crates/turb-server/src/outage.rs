//! Source outage bookkeeping for the refresh loop.
//!
//! The loop retries the decoder every cycle regardless; this only decides
//! which failures are worth a warning so a long outage doesn't turn into a
//! log storm. Reports go out on the first failure and then at doubling
//! intervals up to `max`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OutageTracker {
    base: Duration,
    max: Duration,
    interval: Duration,
    failures: u32,
    started_at: Option<Instant>,
    next_report_at: Instant,
}

impl OutageTracker {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            interval: base,
            failures: 0,
            started_at: None,
            next_report_at: Instant::now(),
        }
    }

    /// Record a failed pull. Returns the consecutive failure count when this
    /// failure should be reported.
    pub fn fail(&mut self) -> Option<u32> {
        let now = Instant::now();
        self.failures = self.failures.saturating_add(1);
        self.started_at.get_or_insert(now);

        if now < self.next_report_at && self.failures > 1 {
            return None;
        }
        self.next_report_at = now + self.interval;
        self.interval = self.interval.saturating_mul(2).min(self.max);
        Some(self.failures)
    }

    /// Record a successful pull. Returns the failure count and outage length
    /// if an outage just ended.
    pub fn recover(&mut self) -> Option<(u32, Duration)> {
        let started_at = self.started_at.take()?;
        let failures = std::mem::take(&mut self.failures);
        self.interval = self.base;
        self.next_report_at = Instant::now();
        Some((failures, started_at.elapsed()))
    }
}
