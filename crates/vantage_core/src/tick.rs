//! # Tick Loop
//!
//! Fixed-timestep pacing for the host's simulation thread.
//!
//! ```text
//!  wall clock ──> backlog += elapsed ──> backlog >= budget ? run tick : wait
//! ```
//!
//! A slow tick leaves backlog behind, so the following calls to
//! [`TickLoop::should_tick`] return `true` until the host has caught up.
//! Host events are drained before the refresh pass of each tick.

use std::time::{Duration, Instant};

use vantage_shared::TICK_RATE;

/// Below this much remaining time the wait spins instead of sleeping.
const SPIN_WINDOW: Duration = Duration::from_micros(500);

/// Paces ticks at a fixed rate.
pub struct TickLoop {
    budget: Duration,
    previous: Instant,
    backlog: Duration,
    count: u64,
    stats: TickStats,
}

/// Timings of executed ticks, in microseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Fastest tick.
    pub min_tick_us: u64,
    /// Slowest tick.
    pub max_tick_us: u64,
    /// Exponential moving average (1/16 weight per tick).
    pub avg_tick_us: u64,
    /// Ticks that took longer than the budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(budget: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            avg_tick_us: as_micros(budget),
            ..Self::default()
        }
    }

    /// Folds one measurement in. Returns `true` if it overran `budget`.
    fn record(&mut self, took: Duration, budget: Duration) -> bool {
        let us = as_micros(took);
        self.total_ticks += 1;
        self.min_tick_us = self.min_tick_us.min(us);
        self.max_tick_us = self.max_tick_us.max(us);
        self.avg_tick_us = (self.avg_tick_us * 15 + us) / 16;
        let late = took > budget;
        if late {
            self.late_ticks += 1;
        }
        late
    }
}

fn as_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl TickLoop {
    /// Paces `tick_rate` ticks per second. A rate of zero is treated as one.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let budget = Duration::from_secs(1) / tick_rate.max(1);
        Self {
            budget,
            previous: Instant::now(),
            backlog: Duration::ZERO,
            count: 0,
            stats: TickStats::fresh(budget),
        }
    }

    /// Accounts for elapsed time and reports whether a tick is owed.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.backlog += now - self.previous;
        self.previous = now;
        self.backlog >= self.budget
    }

    /// Consumes one budget from the backlog. Pass the result to [`Self::end_tick`].
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.backlog = self.backlog.saturating_sub(self.budget);
        self.count += 1;
        Instant::now()
    }

    /// Records how long the tick begun at `started` took.
    pub fn end_tick(&mut self, started: Instant) {
        let took = started.elapsed();
        if self.stats.record(took, self.budget) {
            tracing::debug!("Tick {} took {:?}, budget {:?}", self.count, took, self.budget);
        }
    }

    /// Blocks until the next tick is owed.
    pub fn wait_for_next_tick(&self) {
        let Some(remaining) = self.budget.checked_sub(self.previous.elapsed()) else {
            return;
        };
        if remaining > SPIN_WINDOW * 2 {
            std::thread::sleep(remaining - SPIN_WINDOW);
        }
        while self.previous.elapsed() < self.budget {
            std::hint::spin_loop();
        }
    }

    /// Ticks begun so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Time allotted to one tick.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.budget
    }

    /// Forgets all measurements.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.budget);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(TICK_RATE)
    }
}
