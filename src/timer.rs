//! Retransmission timer capability
//!
//! The sender owns exactly one countdown.  It never reads a clock to decide
//! when to retransmit; instead whoever drives the sender watches the timer and
//! calls [`crate::Sender::on_timeout`] when the countdown runs out.
//!
//! - [`ManualTimer`]: virtual-time timer for tests and the simulator.
//! - [`crate::net::DeadlineTimer`]: tokio-clock timer for the UDP driver.

use std::time::Duration;

/// Single restartable countdown.
pub trait Timer {
    /// Arm the countdown for `timeout`, replacing any pending one.
    fn start(&mut self, timeout: Duration);

    /// Cancel the pending countdown, if any.
    fn stop(&mut self);

    /// Monotonic time since the timer was created (diagnostics only).
    fn now(&self) -> Duration;
}

/// Timer driven by an external virtual clock.
///
/// Every `start` or `stop` bumps `generation`, so a driver that scheduled an
/// expiry for an older generation can recognise it as stale.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now: Duration,
    deadline: Option<Duration>,
    generation: u64,
    starts: u64,
    stops: u64,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward (never backwards).
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Absolute virtual time at which the pending countdown fires
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Incremented on every `start` / `stop`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of `start` calls so far
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Number of `stop` calls so far
    pub fn stops(&self) -> u64 {
        self.stops
    }

    /// Advance the clock to `now` and report whether the countdown expired.
    ///
    /// An expired countdown is disarmed; at most one expiry is reported per
    /// `start`.
    pub fn advance(&mut self, now: Duration) -> bool {
        self.set_now(now);
        match self.deadline {
            Some(deadline) if deadline <= self.now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Timer for ManualTimer {
    fn start(&mut self, timeout: Duration) {
        self.deadline = Some(self.now + timeout);
        self.generation += 1;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.deadline = None;
        self.generation += 1;
        self.stops += 1;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
