//! Cancellable timers driven by an explicit clock.
//!
//! The host calls [`Engine::tick`](crate::engine::Engine::tick) with the
//! current [`Instant`]; every debounce and retry loop in the engine is one of
//! these small state machines polled from there. Nothing here spawns threads
//! or reads the wall clock.

use std::time::{Duration, Instant};

/// Trailing-edge debounce: `idle → pending → fired → idle`.
///
/// A new trigger while pending supersedes the old deadline.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)start the countdown from `now`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Schedule firing at an explicit deadline, replacing any pending one.
    pub fn trigger_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Drop a pending deadline without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Bounded fixed-period retry.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
    attempts: u32,
    max_attempts: u32,
}

impl Interval {
    pub fn new(period: Duration, max_attempts: u32) -> Self {
        Self {
            period,
            next: None,
            attempts: 0,
            max_attempts,
        }
    }

    /// Begin ticking; the first attempt is due one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.attempts = 0;
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Whether the attempt budget is used up.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Returns the attempt number (1-based) when an attempt is due.
    /// Stops itself once the budget is spent.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let due = self.next.filter(|next| now >= *next)?;
        self.attempts += 1;
        self.next = if self.exhausted() {
            None
        } else {
            Some(due + self.period)
        };
        Some(self.attempts)
    }
}
