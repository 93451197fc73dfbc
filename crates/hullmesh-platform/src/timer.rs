//! Timers
//!
//! Debounce timers for coalescing bursts of edits, plus high-resolution
//! timers for profiling.
//!
//! Timers here never spawn threads or install callbacks; the owning thread
//! polls them with the current [`Instant`].

use std::time::{Duration, Instant};

/// Restartable single-shot timer.
///
/// Every [`restart`](Self::restart) pushes the deadline out by the full
/// delay, so a burst of restarts fires once, `delay` after the last one.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    /// Create an idle debounce timer
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)start the timer relative to `now`
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Check if the timer is armed
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Get the current deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm the timer without firing
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Fire if the deadline has passed. Returns `true` exactly once per arm.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Fire immediately if armed, regardless of the deadline
    pub fn fire_now(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// High-resolution timer for performance measurement
#[derive(Debug, Clone, Copy)]
pub struct HighResTimer {
    start: Instant,
}

impl HighResTimer {
    /// Create and start a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for HighResTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped timer that reports its duration to tracing on drop
pub struct ScopedTimer<'a> {
    name: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    /// Start timing `name`
    pub fn traced(name: &'a str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            target: "timing",
            name = self.name,
            duration_us = self.start.elapsed().as_micros() as u64,
            "Timer completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_fires_once_after_delay() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(500));
        assert!(!debounce.is_pending());
        assert!(!debounce.fire_if_due(start));

        debounce.restart(start);
        assert!(debounce.is_pending());
        assert!(!debounce.fire_if_due(start + Duration::from_millis(499)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(500)));
        assert!(!debounce.fire_if_due(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_debounce_restart_pushes_deadline() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(500));

        debounce.restart(start);
        debounce.restart(start + Duration::from_millis(300));

        assert!(!debounce.fire_if_due(start + Duration::from_millis(600)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(800)));
    }

    #[test]
    fn test_debounce_cancel_and_fire_now() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_secs(60));

        debounce.restart(start);
        debounce.cancel();
        assert!(!debounce.fire_now());

        debounce.restart(start);
        assert!(debounce.fire_now());
        assert!(!debounce.is_pending());
    }

    #[test]
    fn test_zero_delay_fires_immediately() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::ZERO);
        debounce.restart(start);
        assert!(debounce.fire_if_due(start));
    }

    #[test]
    fn test_high_res_timer() {
        let timer = HighResTimer::new();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_millis() >= 10.0);
    }
}
