//! Time measurement utilities

use std::time::{Duration, Instant};

/// Wall-clock time a render session spent sampling
///
/// Paused and editing periods are not counted. Scene edits restart
/// convergence, so the controller restarts the timer after each bracket and
/// viewport halt times are measured from there.
#[derive(Debug, Clone, Default)]
pub struct SamplingTimer {
    running_since: Option<Instant>,
    banked: Duration,
}

impl SamplingTimer {
    /// Timer that is already counting
    pub fn started() -> Self {
        Self {
            running_since: Some(Instant::now()),
            banked: Duration::ZERO,
        }
    }

    /// Stop counting and keep the time so far
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.banked += since.elapsed();
        }
    }

    /// Drop the time so far and start counting again
    pub fn restart(&mut self) -> Duration {
        let previous = self.elapsed();
        *self = Self::started();
        previous
    }

    /// Time spent sampling
    pub fn elapsed(&self) -> Duration {
        self.banked + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}
