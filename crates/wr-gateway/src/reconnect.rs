//! Restart policy for the session supervisor
//!
//! Each ended session asks the policy how long to wait before the next
//! attempt. Sessions that reached Open reset the policy. Attempts that fail
//! before opening grow the delay exponentially, and after `max_attempts` of
//! them in a row the circuit opens for the configured cooldown.

use std::time::Duration;

use wr_core::config::BackoffConfig;

/// Wait before the next session attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Regular backoff step
    Backoff(Duration),
    /// Too many failures in a row; attempts pause for the cooldown
    CircuitOpen(Duration),
}

impl Delay {
    pub fn duration(self) -> Duration {
        match self {
            Delay::Backoff(d) | Delay::CircuitOpen(d) => d,
        }
    }
}

/// Backoff and circuit breaker state for one supervisor
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial: Duration,
    /// Base of the next backoff step, before jitter
    step: Duration,
    max: Duration,
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
    /// 0 disables the circuit breaker
    max_attempts: u32,
    cooldown: Duration,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            initial: config.initial,
            step: config.initial,
            max: config.max,
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
            max_attempts: config.max_attempts,
            cooldown: config.circuit_cooldown,
            failures: 0,
        }
    }

    /// Consecutive attempts that failed before opening
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay after a session that reached Open
    pub fn after_open(&mut self) -> Delay {
        self.failures = 0;
        self.step = self.initial;
        Delay::Backoff(self.advance())
    }

    /// Delay after an attempt that never reached Open
    pub fn after_failure(&mut self) -> Delay {
        self.failures += 1;

        if self.max_attempts > 0 && self.failures >= self.max_attempts {
            self.failures = 0;
            self.step = self.initial;
            return Delay::CircuitOpen(self.cooldown);
        }

        Delay::Backoff(self.advance())
    }

    fn advance(&mut self) -> Duration {
        let delay = self.step;

        let next = Duration::from_secs_f64(self.step.as_secs_f64() * self.multiplier);
        self.step = next.min(self.max);

        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(jitter_amount)
    }
}
