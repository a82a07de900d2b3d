//! Bounded waits
//!
//! UI assertions poll until they hold or their budget runs out.

use std::time::Duration;

use tokio::time::Instant;

/// Deadline for a polling loop
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    until: Instant,
    budget: Duration,
    interval: Duration,
}

impl Deadline {
    pub fn new(budget: Duration, interval: Duration) -> Self {
        Self {
            until: Instant::now() + budget,
            budget,
            interval,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.until
    }

    /// Budget in milliseconds, for error messages
    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }

    /// Sleep one poll interval, never past the deadline
    pub async fn tick(&self) {
        let remaining = self.until.saturating_duration_since(Instant::now());
        tokio::time::sleep(self.interval.min(remaining)).await;
    }
}
