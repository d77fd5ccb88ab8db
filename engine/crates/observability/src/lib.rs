use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// What one simulation tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickMetrics {
    pub tick_number: u64,
    pub duration_us: u128,
    pub spawned: usize,
    /// Spawns skipped because no free cell was found within the attempt budget.
    pub spawn_failures: usize,
    pub moved: usize,
    /// Live mobs in the target world after the tick.
    pub mob_count: usize,
    pub sessions_reached: usize,
    pub sessions_dropped: usize,
}

impl TickMetrics {
    /// Log at debug level, or warn if the tick overran its interval.
    pub fn log(&self, budget: Duration) {
        let budget_us = budget.as_micros();
        if self.duration_us > budget_us {
            tracing::warn!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                spawned = self.spawned,
                spawn_failures = self.spawn_failures,
                moved = self.moved,
                mobs = self.mob_count,
                sessions = self.sessions_reached,
                dropped = self.sessions_dropped,
                "tick exceeded budget ({}us > {}us)",
                self.duration_us,
                budget_us
            );
        } else {
            tracing::debug!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                spawned = self.spawned,
                spawn_failures = self.spawn_failures,
                moved = self.moved,
                mobs = self.mob_count,
                sessions = self.sessions_reached,
                dropped = self.sessions_dropped,
                "tick completed"
            );
        }
    }
}
