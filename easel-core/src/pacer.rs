//! Pacing for the repair loops.
//!
//! A run queues paints far faster than the pump flushes them. The pacer
//! pauses the producing task briefly after every `divisor` paints so the
//! agent's timers and socket handling keep running.

use std::time::Duration;

/// Default pause taken at each pacing point.
pub const DEFAULT_PACING_PAUSE: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Pacer {
    pause: Duration,
    issued: u64,
}

impl Pacer {
    pub fn new(pause: Duration) -> Self {
        Self { pause, issued: 0 }
    }

    /// Count one paint; pause if it lands on a pacing point.
    ///
    /// Returns `true` when a pause was taken.
    pub async fn step(&mut self, divisor: u32) -> bool {
        self.issued += 1;
        if self.issued % divisor.max(1) as u64 != 0 {
            return false;
        }
        if self.pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.pause).await;
        }
        true
    }

    /// Paints counted so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_PAUSE)
    }
}
