//! # Refresh Scheduler
//!
//! Keeps every watched subject's proxy current, once per tick.
//!
//! The dominant case is a subject that has not moved: its pose compares
//! equal to the last placement and nothing is recomputed or sent.

use crate::registry::{RefreshOutcome, SpectationContext, SpectationRegistry};

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Subjects whose proxy moved.
    pub refreshed: usize,
    /// Subjects that had not moved.
    pub skipped: usize,
    /// Subjects whose spectators were dropped (ineligible or gone).
    pub cascaded: usize,
    /// Orphaned proxies released.
    pub healed: usize,
}

/// The single recurring refresh task.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    started: bool,
    ticks: u64,
}

impl RefreshScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the task. Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.started {
            tracing::debug!("Refresh scheduler already running");
            return false;
        }
        self.started = true;
        tracing::info!("Refresh scheduler started");
        true
    }

    /// Whether [`Self::start`] has been called.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Ticks executed since start.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one refresh pass. Does nothing until started.
    pub fn tick(
        &mut self,
        registry: &mut SpectationRegistry,
        ctx: &mut SpectationContext<'_>,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();
        if !self.started {
            return report;
        }
        self.ticks += 1;

        registry.check_invariants();
        report.healed = registry.heal_orphans(ctx);

        for subject in registry.watched_subjects() {
            match registry.refresh(subject, ctx) {
                RefreshOutcome::Refreshed => report.refreshed += 1,
                RefreshOutcome::Skipped => report.skipped += 1,
                RefreshOutcome::Cascaded | RefreshOutcome::Removed => report.cascaded += 1,
                RefreshOutcome::Idle => {}
            }
        }

        if report.refreshed + report.cascaded + report.healed > 0 {
            tracing::debug!(
                "Tick {}: {} refreshed, {} skipped, {} cascaded, {} healed",
                self.ticks,
                report.refreshed,
                report.skipped,
                report.cascaded,
                report.healed
            );
        }
        report
    }
}
