//! Remaining-time accounting for one request.

use std::time::{Duration, Instant};

/// The portion of a request's total timeout that has not been spent yet.
///
/// The remaining time only ever shrinks. Once it reaches zero the budget is
/// exhausted and [`TimeBudget::remaining`] returns `None`, which the receive
/// loop takes as the signal to stop without issuing another wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    remaining: Duration,
}

impl TimeBudget {
    pub fn new(total: Duration) -> Self {
        Self { remaining: total }
    }

    /// Time left, or `None` once the budget is used up.
    pub fn remaining(&self) -> Option<Duration> {
        (!self.remaining.is_zero()).then_some(self.remaining)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Charges `elapsed` against the budget, saturating at zero.
    pub fn spend(&mut self, elapsed: Duration) {
        self.remaining = self.remaining.saturating_sub(elapsed);
    }

    /// Charges the wall-clock time since `started` against the budget.
    pub fn spend_since(&mut self, started: Instant) {
        self.spend(started.elapsed());
    }
}
